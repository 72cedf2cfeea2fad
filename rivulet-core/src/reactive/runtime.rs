//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computeds
//! and effects. It owns the graph, the active-consumer stack and the batch
//! state, and it is the only place where user code (getters, effect bodies,
//! equality predicates) is called.
//!
//! # How It Works
//!
//! 1. Writing a signal stores the new value, marks the signal dirty and
//!    walks its subscribers (push): everything downstream becomes pending and
//!    reachable effects are queued.
//!
//! 2. The queue is flushed once the write returns, or when the outermost
//!    batch closes.
//!
//! 3. A pending node is resolved lazily when read (pull): its dependencies
//!    are resolved depth-first, and it only re-evaluates if one of them
//!    actually produced a different value.
//!
//! # Borrowing
//!
//! The graph sits in a `RefCell`. No borrow of it is ever held while user
//! code runs, so getters and effects are free to read, write, create and
//! dispose nodes. Values and closures removed from the graph are dropped only
//! after the borrow is released, since dropping them can itself release
//! nodes.
//!
//! # Thread Safety
//!
//! A runtime is single-threaded (`!Send`). Hosts that need to share one
//! across threads must put the whole runtime behind a single lock; none of
//! the graph mutations are individually atomic.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::computed::Computed;
use super::context::{ContextStack, TrackingScope, UntrackedScope};
use super::effect::Effect;
use super::handle::NodeRef;
use super::signal::Signal;
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};
use crate::graph::{
    erase_equality, Cleanup, EffectFn, Equality, Getter, Graph, Node, NodeId, NodeKind,
    ReactiveFlags, Value,
};

/// Shared state behind a [`Runtime`] and every handle it created.
pub(crate) struct RuntimeInner {
    pub(crate) graph: RefCell<Graph>,
    pub(crate) context: ContextStack,
    batch_depth: Cell<usize>,
    flushing: Cell<bool>,
    /// First equality-predicate panic caught since the last public call.
    deferred_panic: RefCell<Option<Box<dyn Any + Send>>>,
    config: RuntimeConfig,
}

fn wrong_kind(node: NodeId, expected: &'static str) -> ReactiveError {
    ReactiveError::WrongKind { node, expected }
}

impl RuntimeInner {
    pub(crate) fn new(config: RuntimeConfig) -> Self {
        Self {
            graph: RefCell::new(Graph::with_max_depth(config.max_depth)),
            context: ContextStack::default(),
            batch_depth: Cell::new(0),
            flushing: Cell::new(false),
            deferred_panic: RefCell::new(None),
            config,
        }
    }

    /// Compare two values with a node's predicate.
    ///
    /// A panicking predicate counts as "changed" so propagation still
    /// happens; its payload is parked and re-raised by [`Self::finish`] once
    /// the engine is consistent again.
    fn values_differ(&self, equals: &Equality, old: &dyn Any, new: &dyn Any) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| equals(old, new))) {
            Ok(equal) => !equal,
            Err(payload) => {
                warn!(target: "rivulet", "equality predicate panicked; treating value as changed");
                self.deferred_panic.borrow_mut().get_or_insert(payload);
                true
            }
        }
    }

    /// Close out a public operation: re-raise a parked predicate panic, or
    /// pass the result through.
    ///
    /// Calls made from inside a getter, an effect body, a flush or a batch
    /// leave the payload parked; it surfaces when the outermost call returns.
    pub(crate) fn finish<T>(&self, result: Result<T>) -> Result<T> {
        if self.is_nested() {
            return result;
        }
        let parked = self.deferred_panic.borrow_mut().take();
        if let Some(payload) = parked {
            panic::resume_unwind(payload);
        }
        result
    }

    fn is_nested(&self) -> bool {
        self.flushing.get() || self.batch_depth.get() > 0 || self.context.is_evaluating()
    }

    /// Link `id` to the active consumer, if there is one.
    fn track(&self, id: NodeId) {
        if let Some(active) = self.context.current() {
            self.graph.borrow_mut().link(id, active);
        }
    }

    // ------------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------------

    pub(crate) fn read_signal(&self, id: NodeId) -> Result<Value> {
        let dirty = {
            let graph = self.graph.borrow();
            let node = graph.node(id)?;
            if !matches!(node.kind, NodeKind::Signal { .. }) {
                return Err(wrong_kind(id, "signal"));
            }
            node.flags.contains(ReactiveFlags::DIRTY)
        };
        if dirty && self.update_signal(id)? {
            let mut graph = self.graph.borrow_mut();
            let subs = graph.node(id)?.subs;
            graph.shallow_propagate(subs);
        }
        self.track(id);

        let graph = self.graph.borrow();
        match &graph.node(id)?.kind {
            NodeKind::Signal { value, .. } => Ok(Rc::clone(value)),
            _ => Err(wrong_kind(id, "signal")),
        }
    }

    /// Store a new value. Equal values (by the signal's predicate) are a
    /// no-op; otherwise the signal's subscribers are marked and the effect
    /// queue is flushed unless a batch is open.
    pub(crate) fn write_signal(&self, id: NodeId, new: Value) -> Result<()> {
        let (equals, current) = {
            let graph = self.graph.borrow();
            match &graph.node(id)?.kind {
                NodeKind::Signal { value, equals, .. } => (Rc::clone(equals), Rc::clone(value)),
                _ => return Err(wrong_kind(id, "signal")),
            }
        };
        if !self.values_differ(&equals, &*current, &*new) {
            return Ok(());
        }

        let (replaced, subs) = {
            let mut graph = self.graph.borrow_mut();
            let node = graph.node_mut(id)?;
            node.flags = ReactiveFlags::MUTABLE | ReactiveFlags::DIRTY;
            let subs = node.subs;
            match &mut node.kind {
                NodeKind::Signal { value, .. } => (mem::replace(value, new), subs),
                _ => return Err(wrong_kind(id, "signal")),
            }
        };
        drop(replaced);
        drop(current);

        if subs.is_some() {
            self.graph.borrow_mut().propagate(subs)?;
            self.flush()?;
        }
        Ok(())
    }

    /// Settle a dirty signal: report whether its value differs from the one
    /// last observed, and make the current value the observed one.
    fn update_signal(&self, id: NodeId) -> Result<bool> {
        let (equals, previous, value) = {
            let mut graph = self.graph.borrow_mut();
            let node = graph.node_mut(id)?;
            node.flags.remove(ReactiveFlags::DIRTY);
            match &node.kind {
                NodeKind::Signal { value, previous, equals } => {
                    (Rc::clone(equals), Rc::clone(previous), Rc::clone(value))
                }
                _ => return Err(wrong_kind(id, "signal")),
            }
        };
        let changed = self.values_differ(&equals, &*previous, &*value);

        let stale = {
            let mut graph = self.graph.borrow_mut();
            match graph.nodes.get_mut(id).map(|node| &mut node.kind) {
                Some(NodeKind::Signal { previous, .. }) => Some(mem::replace(previous, value)),
                _ => None,
            }
        };
        drop(stale);
        Ok(changed)
    }

    // ------------------------------------------------------------------------
    // Computeds
    // ------------------------------------------------------------------------

    /// Return the up-to-date value of a computed, evaluating it at most once.
    pub(crate) fn read_computed(&self, id: NodeId) -> Result<Value> {
        let flags = {
            let graph = self.graph.borrow();
            let node = graph.node(id)?;
            if !node.is_computed() {
                return Err(wrong_kind(id, "computed"));
            }
            node.flags
        };
        if flags.contains(ReactiveFlags::TRACKING) {
            return Err(ReactiveError::Cycle(id));
        }

        if flags.contains(ReactiveFlags::DIRTY)
            || (flags.contains(ReactiveFlags::PENDING) && self.check_dirty(id, 0)?)
        {
            if self.update_computed(id)? {
                let mut graph = self.graph.borrow_mut();
                let subs = graph.node(id)?.subs;
                graph.shallow_propagate(subs);
            }
        } else if flags.contains(ReactiveFlags::PENDING) {
            self.graph
                .borrow_mut()
                .node_mut(id)?
                .flags
                .remove(ReactiveFlags::PENDING);
        }
        self.track(id);

        let graph = self.graph.borrow();
        match &graph.node(id)?.kind {
            NodeKind::Computed { value: Some(value), .. } => Ok(Rc::clone(value)),
            NodeKind::Computed { value: None, .. } => Err(ReactiveError::Cycle(id)),
            _ => Err(wrong_kind(id, "computed")),
        }
    }

    /// Re-run a computed's getter inside a tracking session. Returns whether
    /// the new value differs from the cached one.
    fn update_computed(&self, id: NodeId) -> Result<bool> {
        let (getter, equals, old) = {
            let graph = self.graph.borrow();
            match &graph.node(id)?.kind {
                NodeKind::Computed { value, getter, equals } => {
                    (Rc::clone(getter), Rc::clone(equals), value.clone())
                }
                _ => return Err(wrong_kind(id, "computed")),
            }
        };

        let new = {
            let mut getter = getter.try_borrow_mut().map_err(|_| ReactiveError::Cycle(id))?;
            let _scope = TrackingScope::enter(self, id);
            (&mut *getter)(old.as_deref())
        };

        let changed = match &old {
            Some(old) => self.values_differ(&equals, &**old, &*new),
            None => true,
        };

        let replaced = {
            let mut graph = self.graph.borrow_mut();
            match graph.nodes.get_mut(id).map(|node| &mut node.kind) {
                Some(NodeKind::Computed { value, .. }) => value.replace(new),
                _ => None,
            }
        };
        drop(replaced);
        Ok(changed)
    }

    /// Bring a dirty producer up to date, reporting whether its value changed.
    fn update(&self, id: NodeId) -> Result<bool> {
        let is_signal = matches!(self.graph.borrow().node(id)?.kind, NodeKind::Signal { .. });
        if is_signal {
            self.update_signal(id)
        } else {
            self.update_computed(id)
        }
    }

    /// Decide whether a pending node really has to re-evaluate.
    ///
    /// Walks `id`'s dependencies in order, resolving pending computeds
    /// depth-first. Stops at the first dependency whose value truly changed
    /// and returns `true`. If every dependency resolves unchanged, returns
    /// `false` and the caller keeps its cached value.
    pub(crate) fn check_dirty(&self, id: NodeId, depth: usize) -> Result<bool> {
        let mut cursor = {
            let graph = self.graph.borrow();
            graph.check_depth(depth)?;
            graph.node(id)?.deps
        };

        while let Some(link) = cursor {
            let (dep, flags) = {
                let graph = self.graph.borrow();
                let Some(dep) = graph.links.get(link).map(|link| link.dep) else {
                    break;
                };
                (dep, graph.node(dep)?.flags)
            };

            let changed = if flags.contains(ReactiveFlags::DIRTY) {
                self.update(dep)?
            } else if flags.contains(ReactiveFlags::MUTABLE | ReactiveFlags::PENDING) {
                if self.check_dirty(dep, depth + 1)? {
                    self.update(dep)?
                } else {
                    self.graph
                        .borrow_mut()
                        .node_mut(dep)?
                        .flags
                        .remove(ReactiveFlags::PENDING);
                    false
                }
            } else {
                false
            };

            let mut graph = self.graph.borrow_mut();
            if changed {
                // Siblings reading the same producer learn it changed; `id`
                // itself is about to be re-evaluated by the caller.
                let node = graph.node(dep)?;
                if node.subs != node.subs_tail {
                    let subs = node.subs;
                    graph.shallow_propagate(subs);
                }
                return Ok(true);
            }
            cursor = graph.links.get(link).and_then(|link| link.next_dep);
        }
        Ok(false)
    }

    // ------------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------------

    pub(crate) fn create_effect(&self, body: EffectFn) -> Result<NodeId> {
        let id = self.graph.borrow_mut().insert(Node::effect(body));
        // A first run that fails must not leave an effect nobody can dispose.
        match panic::catch_unwind(AssertUnwindSafe(|| self.execute_effect(id))) {
            Ok(Ok(())) => Ok(id),
            Ok(Err(err)) => {
                self.release(id);
                Err(err)
            }
            Err(payload) => {
                self.release(id);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Run a dequeued effect if its dependencies really changed.
    fn run_effect(&self, id: NodeId, flags: ReactiveFlags) -> Result<()> {
        let _settle = SettleGuard { runtime: self, id };
        if flags.contains(ReactiveFlags::DIRTY)
            || (flags.contains(ReactiveFlags::PENDING) && self.check_dirty(id, 0)?)
        {
            self.execute_effect(id)?;
        }
        Ok(())
    }

    /// Run an effect body inside a tracking session, after the cleanups its
    /// previous run registered.
    fn execute_effect(&self, id: NodeId) -> Result<()> {
        let (run, cleanups) = {
            let mut graph = self.graph.borrow_mut();
            match &mut graph.node_mut(id)?.kind {
                NodeKind::Effect { run, cleanups, .. } => (Rc::clone(run), mem::take(cleanups)),
                _ => return Err(wrong_kind(id, "effect")),
            }
        };
        for cleanup in cleanups {
            cleanup();
        }
        if !self.graph.borrow().nodes.contains_key(id) {
            // A cleanup disposed the effect.
            return Ok(());
        }

        trace!(target: "rivulet", effect = ?id, "running effect");
        {
            let mut body = run.try_borrow_mut().map_err(|_| ReactiveError::Cycle(id))?;
            let _scope = TrackingScope::enter(self, id);
            (&mut *body)();
        }

        if let Some(node) = self.graph.borrow_mut().nodes.get_mut(id) {
            if let NodeKind::Effect { runs, .. } = &mut node.kind {
                *runs += 1;
            }
        }
        Ok(())
    }

    /// Register a cleanup on the effect currently running. Outside an effect
    /// the callback is dropped unused.
    pub(crate) fn on_cleanup(&self, cleanup: Cleanup) {
        let active = self.context.current();
        let rejected = {
            let mut graph = self.graph.borrow_mut();
            let node = match active {
                Some(id) => graph.nodes.get_mut(id),
                None => None,
            };
            match node.map(|node| &mut node.kind) {
                Some(NodeKind::Effect { cleanups, .. }) => {
                    cleanups.push(cleanup);
                    None
                }
                _ => Some(cleanup),
            }
        };
        if rejected.is_some() {
            trace!(target: "rivulet", "on_cleanup called outside an effect; ignored");
        }
        drop(rejected);
    }

    // ------------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------------

    /// Drain the effect queue in FIFO order.
    ///
    /// A no-op while a batch is open or while an outer flush is already
    /// draining; the outer drain picks up whatever gets queued meanwhile.
    pub(crate) fn flush(&self) -> Result<()> {
        if self.flushing.get() || self.batch_depth.get() > 0 {
            return Ok(());
        }
        let _flushing = FlagGuard::set(&self.flushing);

        let mut runs = 0usize;
        loop {
            let next = self.graph.borrow_mut().next_queued();
            let Some((id, flags)) = next else {
                break;
            };
            if let Some(limit) = self.config.max_flush_runs {
                if runs >= limit {
                    warn!(target: "rivulet", limit, "flush exceeded effect run limit; effects may be re-triggering each other");
                    self.graph.borrow_mut().notify(id);
                    return Err(ReactiveError::FlushLimit(limit));
                }
            }
            runs += 1;
            self.run_effect(id, flags)?;
        }
        if runs > 0 {
            trace!(target: "rivulet", runs, "flush complete");
        }
        Ok(())
    }

    pub(crate) fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let out = {
            let _batch = BatchScope::enter(&self.batch_depth);
            f()
        };
        self.flush()?;
        Ok(out)
    }

    pub(crate) fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _untracked = UntrackedScope::enter(&self.context);
        f()
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Remove a node from the graph. Idempotent.
    ///
    /// Used for explicit effect disposal and when the last handle to a signal
    /// or computed is dropped. Cleanups of a disposed effect run here.
    pub(crate) fn release(&self, id: NodeId) {
        let removed = match self.graph.try_borrow_mut() {
            Ok(mut graph) => graph.remove_node(id),
            Err(_) => {
                warn!(target: "rivulet", node = ?id, "graph busy while releasing node; node leaked");
                return;
            }
        };
        let Some(node) = removed else {
            return;
        };
        debug!(target: "rivulet", node = ?id, kind = node.kind.name(), "node released");
        if let NodeKind::Effect { cleanups, .. } = node.kind {
            for cleanup in cleanups {
                cleanup();
            }
        }
    }

    pub(crate) fn is_alive(&self, id: NodeId) -> bool {
        self.graph.borrow().nodes.contains_key(id)
    }
}

/// Clears an effect's dirty state once a dequeued run is over, however it
/// ended, so later writes can queue it again.
struct SettleGuard<'a> {
    runtime: &'a RuntimeInner,
    id: NodeId,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut graph) = self.runtime.graph.try_borrow_mut() {
            if let Some(node) = graph.nodes.get_mut(self.id) {
                node.flags.remove(ReactiveFlags::DIRTY | ReactiveFlags::PENDING);
            }
        }
    }
}

struct FlagGuard<'a>(&'a Cell<bool>);

impl<'a> FlagGuard<'a> {
    fn set(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct BatchScope<'a>(&'a Cell<usize>);

impl<'a> BatchScope<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// A reactive engine instance.
///
/// Cloning a `Runtime` clones a handle to the same engine. Signal, computed
/// and effect handles only hold a weak reference; once every `Runtime` clone
/// is dropped, their operations fail with
/// [`ReactiveError::RuntimeDropped`].
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use rivulet_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.create_signal(1);
/// let doubled = rt.create_computed({
///     let count = count.clone();
///     move |_| count.get() * 2
/// });
///
/// let seen = Rc::new(Cell::new(0));
/// let _effect = rt.create_effect({
///     let (doubled, seen) = (doubled.clone(), seen.clone());
///     move || seen.set(doubled.get())
/// });
/// assert_eq!(seen.get(), 2);
///
/// count.set(5);
/// assert_eq!(seen.get(), 10);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(config)),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Create a signal compared with `PartialEq`.
    pub fn create_signal<T>(&self, value: T) -> Signal<T>
    where
        T: PartialEq + 'static,
    {
        self.create_signal_with(value, T::eq)
    }

    /// Create a signal with a custom equality predicate. Writes the predicate
    /// considers equal to the current value are dropped.
    pub fn create_signal_with<T, E>(&self, value: T, equals: E) -> Signal<T>
    where
        T: 'static,
        E: Fn(&T, &T) -> bool + 'static,
    {
        let node = Node::signal(Rc::new(value), erase_equality(equals));
        let id = self.inner.graph.borrow_mut().insert(node);
        Signal::from_node(NodeRef::new(&self.inner, id))
    }

    /// Create a lazily evaluated computed compared with `PartialEq`.
    ///
    /// The getter receives the previously cached value (`None` on the first
    /// evaluation). It does not run until the computed is first read.
    pub fn create_computed<T, F>(&self, getter: F) -> Computed<T>
    where
        T: PartialEq + 'static,
        F: FnMut(Option<&T>) -> T + 'static,
    {
        self.create_computed_with(getter, T::eq)
    }

    /// Create a computed with a custom equality predicate. A re-evaluation
    /// the predicate considers equal to the cached value does not propagate.
    pub fn create_computed_with<T, F, E>(&self, mut getter: F, equals: E) -> Computed<T>
    where
        T: 'static,
        F: FnMut(Option<&T>) -> T + 'static,
        E: Fn(&T, &T) -> bool + 'static,
    {
        let erased: Getter = Rc::new(RefCell::new(move |previous: Option<&dyn Any>| -> Value {
            Rc::new(getter(previous.and_then(|value| value.downcast_ref::<T>())))
        }));
        let node = Node::computed(erased, erase_equality(equals));
        let id = self.inner.graph.borrow_mut().insert(node);
        Computed::from_node(NodeRef::new(&self.inner, id))
    }

    /// Create an effect and run it once, synchronously.
    ///
    /// The effect re-runs on every flush after a write that changes something
    /// it read. It stays active until [`Effect::dispose`] is called; dropping
    /// the handle does not stop it.
    ///
    /// # Panics
    ///
    /// Panics if the first run fails; see [`Runtime::try_create_effect`].
    pub fn create_effect<F>(&self, body: F) -> Effect
    where
        F: FnMut() + 'static,
    {
        self.try_create_effect(body)
            .unwrap_or_else(|err| panic!("failed to create effect: {err}"))
    }

    pub fn try_create_effect<F>(&self, body: F) -> Result<Effect>
    where
        F: FnMut() + 'static,
    {
        let run: EffectFn = Rc::new(RefCell::new(body));
        let result = self.inner.create_effect(run);
        self.inner
            .finish(result)
            .map(|id| Effect::new(&self.inner, id))
    }

    /// Run `f` with flushing deferred; queued effects run once, when the
    /// outermost batch returns.
    ///
    /// # Panics
    ///
    /// Panics if the closing flush fails; see [`Runtime::try_batch`].
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.try_batch(f)
            .unwrap_or_else(|err| panic!("batch flush failed: {err}"))
    }

    pub fn try_batch<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let result = self.inner.batch(f);
        self.inner.finish(result)
    }

    /// Run `f` without recording any of its reads as dependencies.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.untracked(f)
    }

    /// Register a callback on the running effect. It runs before the effect's
    /// next run and when the effect is disposed.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) {
        self.inner.on_cleanup(Box::new(cleanup));
    }

    /// Drain the effect queue now. Normally this happens automatically after
    /// each write.
    pub fn flush(&self) -> Result<()> {
        let result = self.inner.flush();
        self.inner.finish(result)
    }

    /// Whether a computed or effect is currently evaluating.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_active()
    }

    pub fn node_count(&self) -> usize {
        self.inner.graph.borrow().node_count()
    }

    /// Number of effects queued and waiting for a flush.
    pub fn pending_effects(&self) -> usize {
        self.inner.graph.borrow().queue.len()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("node_count", &self.node_count())
            .field("pending_effects", &self.pending_effects())
            .field("batch_depth", &self.inner.batch_depth.get())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeState;

    #[test]
    fn write_marks_signal_dirty_until_read() {
        let rt = Runtime::new();
        let s = rt.create_signal(1);
        let c = rt.create_computed({
            let s = s.clone();
            move |_| s.get() + 1
        });
        let _e = rt.create_effect({
            let c = c.clone();
            move || {
                c.get();
            }
        });

        rt.batch(|| {
            s.set(2);
            let graph = rt.inner.graph.borrow();
            assert!(graph.nodes[s.id()].flags.contains(ReactiveFlags::DIRTY));
            assert_eq!(graph.nodes[c.id()].state(), NodeState::Pending);
        });

        let graph = rt.inner.graph.borrow();
        assert!(!graph.nodes[s.id()].flags.contains(ReactiveFlags::DIRTY));
        assert_eq!(graph.nodes[c.id()].state(), NodeState::Clean);
    }

    #[test]
    fn check_dirty_reports_unchanged_dependencies() {
        let rt = Runtime::new();
        let s = rt.create_signal(2);
        let parity = rt.create_computed({
            let s = s.clone();
            move |_| s.get() % 2
        });
        let outer = rt.create_computed({
            let parity = parity.clone();
            move |_| parity.get() * 10
        });
        assert_eq!(outer.get(), 0);

        // Nothing is watching, so the write only marks.
        s.set(4);
        assert_eq!(outer.state(), NodeState::Pending);

        assert!(!rt.inner.check_dirty(outer.id(), 0).unwrap());
        assert_eq!(parity.state(), NodeState::Clean);
    }

    #[test]
    fn check_dirty_respects_depth_limit() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_max_depth(0));
        let s = rt.create_signal(1);
        let inner = rt.create_computed({
            let s = s.clone();
            move |_| s.get()
        });
        let outer = rt.create_computed({
            let inner = inner.clone();
            move |_| inner.get()
        });
        assert_eq!(outer.get(), 1);

        rt.inner.graph.borrow_mut().nodes[inner.id()].flags.insert(ReactiveFlags::PENDING);
        assert_eq!(
            rt.inner.check_dirty(outer.id(), 0),
            Err(ReactiveError::DepthExceeded(0))
        );
    }

    #[test]
    fn finish_reraises_parked_predicate_panic() {
        let rt = Runtime::new();
        let calls = Cell::new(0);
        let s = rt.create_signal_with(1, move |a: &i32, b: &i32| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                panic!("predicate failed");
            }
            a == b
        });

        let result = panic::catch_unwind(AssertUnwindSafe(|| s.set(2)));
        assert!(result.is_err());
        assert!(rt.inner.deferred_panic.borrow().is_none());
        // Fail open: the write went through.
        assert_eq!(s.get_untracked(), 2);
    }

    #[test]
    fn parked_predicate_panic_waits_for_outermost_call() {
        let rt = Runtime::new();
        let armed = Rc::new(Cell::new(false));
        let s = rt.create_signal_with(1, {
            let armed = armed.clone();
            move |a: &i32, b: &i32| {
                if armed.replace(false) {
                    panic!("predicate failed");
                }
                a == b
            }
        });
        let c = rt.create_computed({
            let s = s.clone();
            move |_| s.get() * 10
        });
        let seen = Rc::new(Cell::new(0));
        let effect = rt.create_effect({
            let (c, seen) = (c.clone(), seen.clone());
            move || seen.set(c.get())
        });

        armed.set(true);
        let result = panic::catch_unwind(AssertUnwindSafe(|| s.set(2)));
        assert!(result.is_err());

        // The flush ran to completion before the panic surfaced.
        assert_eq!(seen.get(), 20);
        assert_eq!(effect.run_count(), 2);
        assert_eq!(c.state(), NodeState::Clean);
        assert_eq!(rt.pending_effects(), 0);
        assert!(rt.inner.deferred_panic.borrow().is_none());
    }

    #[test]
    fn predicate_panic_inside_batch_surfaces_when_batch_returns() {
        let rt = Runtime::new();
        let armed = Rc::new(Cell::new(true));
        let s = rt.create_signal_with(1, {
            let armed = armed.clone();
            move |a: &i32, b: &i32| {
                if armed.replace(false) {
                    panic!("predicate failed");
                }
                a == b
            }
        });
        let after_write = Rc::new(Cell::new(false));

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            rt.batch(|| {
                s.set(2);
                after_write.set(true);
            })
        }));
        assert!(result.is_err());
        assert!(after_write.get());
        assert_eq!(s.get_untracked(), 2);
    }

    #[test]
    fn flush_is_a_no_op_inside_batch() {
        let rt = Runtime::new();
        let s = rt.create_signal(0);
        let _e = rt.create_effect({
            let s = s.clone();
            move || {
                s.get();
            }
        });

        rt.batch(|| {
            s.set(1);
            assert_eq!(rt.pending_effects(), 1);
            rt.flush().unwrap();
            assert_eq!(rt.pending_effects(), 1);
        });
        assert_eq!(rt.pending_effects(), 0);
    }
}
