//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued and re-runs when the
//!    queue is flushed, after its dependencies have been resolved. If none of
//!    them actually changed value, the run is skipped.
//!
//! 3. Each run tracks dependencies afresh. Producers the run no longer reads
//!    are unlinked.
//!
//! # Use Cases
//!
//! Effects are used to synchronize reactive state with the outside world:
//!
//! - Logging state changes
//! - Pushing values into a UI or a socket
//! - Writing to files
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds are lazy (compute on access); effects are eager (run when deps change).
//! - Computeds cache results; effects just run their side effect.
//!
//! # Cleanup
//!
//! A running effect can register callbacks with
//! [`Runtime::on_cleanup`](crate::Runtime::on_cleanup). They are called
//! before the effect re-runs and when the effect is disposed.
//!
//! # Lifetime
//!
//! Unlike signals and computeds, an effect is not released when its handle
//! is dropped. It stays subscribed until [`Effect::dispose`] is called.

use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::RuntimeInner;
use crate::graph::{NodeId, NodeKind};

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use rivulet_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.create_signal(0);
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let effect = rt.create_effect({
///     let (count, log) = (count.clone(), log.clone());
///     move || log.borrow_mut().push(count.get())
/// });
///
/// count.set(5);
/// effect.dispose();
/// count.set(6);
/// assert_eq!(*log.borrow(), vec![0, 5]);
/// ```
#[derive(Clone)]
pub struct Effect {
    runtime: Weak<RuntimeInner>,
    id: NodeId,
}

impl Effect {
    pub(crate) fn new(runtime: &Rc<RuntimeInner>, id: NodeId) -> Self {
        Self {
            runtime: Rc::downgrade(runtime),
            id,
        }
    }

    /// Get the effect's graph id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Stop the effect.
    ///
    /// Registered cleanups run, every dependency link is removed and a queued
    /// run is cancelled. Safe to call more than once, and from inside the
    /// effect's own body.
    pub fn dispose(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.release(self.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.runtime
            .upgrade()
            .map_or(true, |runtime| !runtime.is_alive(self.id))
    }

    /// Number of completed runs, including the initial one.
    pub fn run_count(&self) -> usize {
        let Some(runtime) = self.runtime.upgrade() else {
            return 0;
        };
        let graph = runtime.graph.borrow();
        match graph.node(self.id).map(|node| &node.kind) {
            Ok(NodeKind::Effect { runs, .. }) => *runs,
            _ => 0,
        }
    }

    /// Number of producers read by the last run.
    pub fn dependency_count(&self) -> usize {
        self.runtime
            .upgrade()
            .map(|runtime| runtime.graph.borrow().dependency_count(self.id))
            .unwrap_or(0)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}
