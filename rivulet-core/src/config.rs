//! Runtime configuration.
//!
//! The engine trusts its caller not to build cyclic graphs and not to write
//! effects that re-trigger each other forever. Both guards below are off by
//! default; turning them on converts a stack overflow or a hung flush into a
//! [`ReactiveError`](crate::ReactiveError).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for a [`Runtime`](crate::Runtime).
///
/// # Example
///
/// ```
/// use rivulet_core::RuntimeConfig;
///
/// let config = RuntimeConfig::default().with_max_depth(256);
/// assert_eq!(config.max_depth, Some(256));
///
/// let parsed = RuntimeConfig::from_json(r#"{ "max_flush_runs": 10000 }"#).unwrap();
/// assert_eq!(parsed.max_flush_runs, Some(10_000));
/// assert_eq!(parsed.max_depth, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Recursion ceiling for `propagate` and `check_dirty`.
    pub max_depth: Option<usize>,

    /// Ceiling on effect runs within one flush.
    pub max_flush_runs: Option<usize>,
}

impl RuntimeConfig {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_flush_runs(mut self, runs: usize) -> Self {
        self.max_flush_runs = Some(runs);
        self
    }

    /// Parse a config from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_unguarded() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_depth, None);
        assert_eq!(config.max_flush_runs, None);
    }

    #[test]
    fn builder_sets_limits() {
        let config = RuntimeConfig::default()
            .with_max_depth(64)
            .with_max_flush_runs(500);
        assert_eq!(config.max_depth, Some(64));
        assert_eq!(config.max_flush_runs, Some(500));
    }

    #[test]
    fn parses_partial_json() {
        let config = RuntimeConfig::from_json(r#"{ "max_depth": 32 }"#).unwrap();
        assert_eq!(config, RuntimeConfig::default().with_max_depth(32));

        let empty = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(empty, RuntimeConfig::default());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = RuntimeConfig::from_json(r#"{ "max_dept": 32 }"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid runtime config"));
    }
}
