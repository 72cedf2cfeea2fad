//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal or computed is
//! read, it links itself to the consumer on top of the stack.
//!
//! # Implementation
//!
//! Each [`Runtime`](crate::Runtime) owns its own stack, so several engines can
//! live in one process without sharing hidden global state. Entering a
//! computation pushes its node; the guard returned by the push pops it again,
//! even if the computation panics. Nested reads (a computed evaluated while
//! an effect is running) push on top and restore the outer consumer when they
//! finish.
//!
//! An `untracked` section pushes an empty entry: reads inside it see no
//! active consumer.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::runtime::RuntimeInner;
use crate::graph::NodeId;

/// Stack of active consumers. `None` entries mask tracking.
#[derive(Debug, Default)]
pub(crate) struct ContextStack {
    stack: RefCell<SmallVec<[Option<NodeId>; 8]>>,
}

impl ContextStack {
    /// The consumer that reads should currently link to, if any.
    pub(crate) fn current(&self) -> Option<NodeId> {
        self.stack.borrow().last().copied().flatten()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.current().is_some()
    }

    /// Whether any computed or effect is on the stack, including one masked
    /// by an untracked section.
    pub(crate) fn is_evaluating(&self) -> bool {
        self.stack.borrow().iter().any(Option::is_some)
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    fn push(&self, entry: Option<NodeId>) {
        self.stack.borrow_mut().push(entry);
    }

    fn pop(&self, expected: Option<NodeId>) {
        let popped = self.stack.borrow_mut().pop();

        // Verify we're popping the right context.
        // This helps catch bugs where scopes are dropped out of order.
        debug_assert_eq!(
            popped,
            Some(expected),
            "reactive context mismatch: expected {:?}, got {:?}",
            expected,
            popped
        );
    }
}

/// Guard bracketing one tracking session of a computed or effect.
///
/// Entering starts the session and makes the node the active consumer.
/// Dropping pops it and ends the session, pruning dependencies the body did
/// not read this time. This also happens while unwinding.
pub(crate) struct TrackingScope<'a> {
    runtime: &'a RuntimeInner,
    node: NodeId,
}

impl<'a> TrackingScope<'a> {
    pub(crate) fn enter(runtime: &'a RuntimeInner, node: NodeId) -> Self {
        runtime.graph.borrow_mut().start_tracking(node);
        runtime.context.push(Some(node));
        Self { runtime, node }
    }
}

impl Drop for TrackingScope<'_> {
    fn drop(&mut self) {
        self.runtime.context.pop(Some(self.node));
        let aborted = std::thread::panicking();
        if let Ok(mut graph) = self.runtime.graph.try_borrow_mut() {
            graph.end_tracking(self.node, aborted);
        }
    }
}

/// Guard masking the active consumer.
pub(crate) struct UntrackedScope<'a> {
    context: &'a ContextStack,
}

impl<'a> UntrackedScope<'a> {
    pub(crate) fn enter(context: &'a ContextStack) -> Self {
        context.push(None);
        Self { context }
    }
}

impl Drop for UntrackedScope<'_> {
    fn drop(&mut self) {
        self.context.pop(None);
    }
}
