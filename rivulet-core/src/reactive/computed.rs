//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. Creating a computed does not run it. The getter first runs on the
//!    first read and the result is cached.
//!
//! 2. When read again with no upstream writes, the cached value is returned.
//!
//! 3. When a dependency is written, the computed is marked pending.
//!
//! 4. On next read, the computed resolves its dependencies first.
//!
//! 5. Only if one of them actually produced a different value does the
//!    getter run again. Otherwise the cache is marked clean and returned.
//!
//! # Why This Matters
//!
//! This lazy approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 computeds depend on it
//! - Only the computeds actually read will recompute
//! - Computeds that are never read stay pending (no wasted work)
//!
//! A recomputation that yields a value equal to the cached one stops there:
//! nothing downstream of it re-runs.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::context::UntrackedScope;
use super::handle::NodeRef;
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeKind, NodeState};

/// A cached derived value that recomputes only when dependencies change.
///
/// Created with [`Runtime::create_computed`](crate::Runtime::create_computed).
/// The getter receives the previously cached value, which makes accumulators
/// straightforward:
///
/// ```
/// use rivulet_core::Runtime;
///
/// let rt = Runtime::new();
/// let n = rt.create_signal(1);
/// let history = rt.create_computed({
///     let n = n.clone();
///     move |prev: Option<&Vec<i32>>| {
///         let mut out = prev.cloned().unwrap_or_default();
///         out.push(n.get());
///         out
///     }
/// });
///
/// assert_eq!(history.get(), vec![1]);
/// n.set(2);
/// assert_eq!(history.get(), vec![1, 2]);
/// ```
pub struct Computed<T> {
    node: Rc<NodeRef>,
    _marker: PhantomData<T>,
}

impl<T: 'static> Computed<T> {
    pub(crate) fn from_node(node: Rc<NodeRef>) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    /// Borrow the up-to-date value, evaluating the getter if needed and
    /// registering a dependency if a computed or effect is evaluating.
    ///
    /// Reading a computed from inside its own getter fails with
    /// [`ReactiveError::Cycle`].
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let runtime = self.node.runtime()?;
        let result = runtime.read_computed(self.id());
        let value = runtime.finish(result)?;
        let value = value
            .downcast_ref::<T>()
            .ok_or(ReactiveError::TypeMismatch(self.id()))?;
        Ok(f(value))
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with(f).unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn try_with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let runtime = self.node.runtime()?;
        let _untracked = UntrackedScope::enter(&runtime.context);
        self.try_with(f)
    }

    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with_untracked(f)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Get the current reconciliation state.
    pub fn state(&self) -> NodeState {
        self.node
            .runtime()
            .ok()
            .and_then(|runtime| runtime.graph.borrow().node(self.id()).ok().map(|node| node.state()))
            .unwrap_or(NodeState::Dirty)
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        let Ok(runtime) = self.node.runtime() else {
            return false;
        };
        let graph = runtime.graph.borrow();
        matches!(
            graph.node(self.id()).map(|node| &node.kind),
            Ok(NodeKind::Computed { value: Some(_), .. })
        )
    }

    /// Number of consumers currently reading this computed.
    pub fn subscriber_count(&self) -> usize {
        self.node
            .runtime()
            .map(|runtime| runtime.graph.borrow().subscriber_count(self.id()))
            .unwrap_or(0)
    }

    /// Number of producers read by the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.node
            .runtime()
            .map(|runtime| runtime.graph.borrow().dependency_count(self.id()))
            .unwrap_or(0)
    }
}

impl<T: Clone + 'static> Computed<T> {
    pub fn try_get(&self) -> Result<T> {
        self.try_with(T::clone)
    }

    /// Get the up-to-date value.
    ///
    /// # Panics
    ///
    /// Panics if the runtime was dropped or the computed reads itself.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
