//! Error types for the reactive engine.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors raised by graph operations.
///
/// Most of these indicate a caller bug (a stale handle, a cyclic graph) rather
/// than a recoverable condition. The panicking accessors (`get`, `set`, ...)
/// surface them as panic messages; the `try_*` forms hand them back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// The handle outlived the runtime that created it.
    #[error("reactive runtime has been dropped")]
    RuntimeDropped,

    /// The node was disposed and its arena slot reused or freed.
    #[error("node {0:?} has been disposed")]
    Disposed(NodeId),

    /// The node exists but is not the kind the handle expects.
    #[error("node {node:?} is not a {expected}")]
    WrongKind {
        node: NodeId,
        expected: &'static str,
    },

    /// The stored value does not have the handle's type.
    #[error("value of node {0:?} has an unexpected type")]
    TypeMismatch(NodeId),

    /// A computed or effect was asked to evaluate while already evaluating.
    #[error("node {0:?} depends on itself")]
    Cycle(NodeId),

    /// Propagation or dirty resolution recursed past the configured ceiling.
    #[error("dependency walk exceeded the configured depth of {0}")]
    DepthExceeded(usize),

    /// A single flush ran more effects than the configured ceiling.
    #[error("flush exceeded {0} effect runs")]
    FlushLimit(usize),
}

/// Errors raised while loading a [`RuntimeConfig`](crate::RuntimeConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime config: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReactiveError>;
