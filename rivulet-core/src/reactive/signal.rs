//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a computed or effect is evaluating, the
//!    signal links itself to that consumer.
//!
//! 2. Writing a value the signal's predicate considers different marks every
//!    consumer downstream and queues the affected effects.
//!
//! 3. Unless a batch is open, the queue is flushed before the write returns.
//!
//! # Ownership
//!
//! A `Signal` is a cheap handle. Clones share one graph node, which is
//! released when the last clone is dropped. Closures that read a signal keep
//! it alive by capturing a clone.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::context::UntrackedScope;
use super::handle::NodeRef;
use crate::error::{ReactiveError, Result};
use crate::graph::NodeId;

/// A reactive signal holding a value of type `T`.
///
/// Created with [`Runtime::create_signal`](crate::Runtime::create_signal).
///
/// # Example
///
/// ```
/// use rivulet_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.create_signal(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T> {
    node: Rc<NodeRef>,
    _marker: PhantomData<T>,
}

impl<T: 'static> Signal<T> {
    pub(crate) fn from_node(node: Rc<NodeRef>) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }

    /// Get the signal's graph id.
    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    /// Borrow the current value, registering a dependency if a computed or
    /// effect is evaluating.
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let runtime = self.node.runtime()?;
        let result = runtime.read_signal(self.id());
        let value = runtime.finish(result)?;
        let value = value
            .downcast_ref::<T>()
            .ok_or(ReactiveError::TypeMismatch(self.id()))?;
        Ok(f(value))
    }

    /// Borrow the current value.
    ///
    /// # Panics
    ///
    /// Panics if the runtime was dropped.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with(f).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Borrow the current value without registering a dependency.
    pub fn try_with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let runtime = self.node.runtime()?;
        let _untracked = UntrackedScope::enter(&runtime.context);
        self.try_with(f)
    }

    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with_untracked(f)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Replace the value.
    ///
    /// A value equal to the current one is ignored. Otherwise dependents are
    /// marked and, outside a batch, effects run before this returns.
    pub fn try_set(&self, value: T) -> Result<()> {
        let runtime = self.node.runtime()?;
        let result = runtime.write_signal(self.id(), Rc::new(value));
        runtime.finish(result)
    }

    /// Replace the value.
    ///
    /// # Panics
    ///
    /// Panics if the runtime was dropped or the triggered flush fails.
    pub fn set(&self, value: T) {
        self.try_set(value).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Update the value using a function.
    ///
    /// The current value is read without tracking, so calling this inside an
    /// effect does not make the effect depend on the signal.
    pub fn try_update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.try_with_untracked(f)?;
        self.try_set(next)
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        self.try_update(f).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Number of consumers currently reading this signal.
    pub fn subscriber_count(&self) -> usize {
        self.node
            .runtime()
            .map(|runtime| runtime.graph.borrow().subscriber_count(self.id()))
            .unwrap_or(0)
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get a clone of the current value, registering a dependency if a
    /// computed or effect is evaluating.
    pub fn try_get(&self) -> Result<T> {
        self.try_with(T::clone)
    }

    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    ///
    /// Use this when you need to read the value without establishing
    /// a reactive dependency.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
            _marker: PhantomData,
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Signal");
        out.field("id", &self.id());
        match self.try_with_untracked(|value| format!("{value:?}")) {
            Ok(value) => out.field("value", &format_args!("{value}")),
            Err(err) => out.field("error", &format_args!("{err}")),
        };
        out.field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use crate::{ReactiveError, Runtime};

    #[test]
    fn signal_get_and_set() {
        let rt = Runtime::new();
        let signal = rt.create_signal(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let rt = Runtime::new();
        let signal = rt.create_signal(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_clone_shares_state() {
        let rt = Runtime::new();
        let signal1 = rt.create_signal(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn signal_with_borrows_without_clone() {
        let rt = Runtime::new();
        let names = rt.create_signal(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(names.with(|v| v.len()), 2);
        assert_eq!(names.with(|v| v[1].clone()), "b");
    }

    #[test]
    fn custom_equality_drops_equivalent_writes() {
        let rt = Runtime::new();
        let signal = rt.create_signal_with(1.0_f64, |a: &f64, b: &f64| (a - b).abs() < 0.5);
        let runs = std::rc::Rc::new(Cell::new(0));
        let _effect = rt.create_effect({
            let (signal, runs) = (signal.clone(), runs.clone());
            move || {
                signal.get();
                runs.set(runs.get() + 1);
            }
        });

        signal.set(1.2);
        assert_eq!(signal.get(), 1.0);
        assert_eq!(runs.get(), 1);

        signal.set(2.0);
        assert_eq!(signal.get(), 2.0);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn signal_reports_subscribers() {
        let rt = Runtime::new();
        let signal = rt.create_signal(1);
        assert_eq!(signal.subscriber_count(), 0);

        let effect = rt.create_effect({
            let signal = signal.clone();
            move || {
                signal.get();
            }
        });
        assert_eq!(signal.subscriber_count(), 1);

        effect.dispose();
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn signal_fails_after_runtime_dropped() {
        let rt = Runtime::new();
        let signal = rt.create_signal(1);
        drop(rt);

        assert_eq!(signal.try_get(), Err(ReactiveError::RuntimeDropped));
        assert_eq!(signal.try_set(2), Err(ReactiveError::RuntimeDropped));
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn dropping_last_handle_releases_node() {
        let rt = Runtime::new();
        let signal = rt.create_signal(1);
        let clone = signal.clone();
        assert_eq!(rt.node_count(), 1);

        drop(signal);
        assert_eq!(rt.node_count(), 1);
        drop(clone);
        assert_eq!(rt.node_count(), 0);
    }

    #[test]
    fn debug_shows_value() {
        let rt = Runtime::new();
        let signal = rt.create_signal(7);
        let rendered = format!("{signal:?}");
        assert!(rendered.contains("value: 7"));
    }
}
