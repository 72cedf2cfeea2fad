//! Graph Nodes
//!
//! This module defines the record every graph participant shares. A node is
//! one of three kinds: a signal (pure producer), a computed (producer and
//! consumer) or an effect (pure consumer).

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use slotmap::new_key_type;

use super::link::LinkId;

new_key_type! {
    /// Generation-checked handle to a node in the graph.
    ///
    /// A stale id (one whose node was disposed) never resolves to whatever
    /// node later reuses the slot.
    pub struct NodeId;
}

bitflags! {
    /// Per-node state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ReactiveFlags: u8 {
        /// The node holds a value (signal or computed).
        const MUTABLE = 1 << 0;
        /// The node is an active effect.
        const WATCHING = 1 << 1;
        /// Known stale; must update before the next read.
        const DIRTY = 1 << 2;
        /// An upstream producer changed; staleness not yet confirmed.
        const PENDING = 1 << 3;
        /// Sitting in the effect queue.
        const QUEUED = 1 << 4;
        /// The node's getter or body is currently on the stack.
        const TRACKING = 1 << 5;
    }
}

/// Type-erased value stored in a signal or computed.
pub(crate) type Value = Rc<dyn Any>;

/// Type-erased equality predicate. Returns `true` when the values are equal.
pub(crate) type Equality = Rc<dyn Fn(&dyn Any, &dyn Any) -> bool>;

/// Computed getter: previous cached value in, new value out.
pub(crate) type Getter = Rc<RefCell<dyn FnMut(Option<&dyn Any>) -> Value>>;

/// Effect body.
pub(crate) type EffectFn = Rc<RefCell<dyn FnMut()>>;

/// Callback registered by a running effect.
pub(crate) type Cleanup = Box<dyn FnOnce()>;

/// Wrap a typed predicate into an [`Equality`].
///
/// Values of the wrong type compare unequal, which fails open.
pub(crate) fn erase_equality<T, F>(eq: F) -> Equality
where
    T: 'static,
    F: Fn(&T, &T) -> bool + 'static,
{
    Rc::new(move |a: &dyn Any, b: &dyn Any| {
        match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(a), Some(b)) => eq(a, b),
            _ => false,
        }
    })
}

/// Kind-specific payload of a node.
pub(crate) enum NodeKind {
    Signal {
        value: Value,
        /// Value last observed by a read; compared against `value` to decide
        /// whether a pending write actually changed anything.
        previous: Value,
        equals: Equality,
    },
    Computed {
        value: Option<Value>,
        getter: Getter,
        equals: Equality,
    },
    Effect {
        run: EffectFn,
        cleanups: Vec<Cleanup>,
        runs: usize,
    },
}

impl NodeKind {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            NodeKind::Signal { .. } => "signal",
            NodeKind::Computed { .. } => "computed",
            NodeKind::Effect { .. } => "effect",
        }
    }
}

/// A node in the dependency graph.
///
/// `deps`/`deps_tail` bound the list of links to producers this node reads;
/// `subs`/`subs_tail` bound the list of links to consumers reading it. While
/// the node is being tracked, `deps_tail` is the cursor of links confirmed so
/// far in this session rather than the true end of the list.
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) flags: ReactiveFlags,
    /// Tracking session stamp; links confirmed in the current session carry it.
    pub(crate) version: u64,
    pub(crate) deps: Option<LinkId>,
    pub(crate) deps_tail: Option<LinkId>,
    pub(crate) subs: Option<LinkId>,
    pub(crate) subs_tail: Option<LinkId>,
}

impl Node {
    fn new(kind: NodeKind, flags: ReactiveFlags) -> Self {
        Self {
            kind,
            flags,
            version: 0,
            deps: None,
            deps_tail: None,
            subs: None,
            subs_tail: None,
        }
    }

    /// Create a signal node holding `value`.
    pub(crate) fn signal(value: Value, equals: Equality) -> Self {
        let previous = Rc::clone(&value);
        Self::new(
            NodeKind::Signal {
                value,
                previous,
                equals,
            },
            ReactiveFlags::MUTABLE,
        )
    }

    /// Create a computed node. It starts dirty so the first read evaluates it.
    pub(crate) fn computed(getter: Getter, equals: Equality) -> Self {
        Self::new(
            NodeKind::Computed {
                value: None,
                getter,
                equals,
            },
            ReactiveFlags::MUTABLE | ReactiveFlags::DIRTY,
        )
    }

    /// Create an active effect node.
    pub(crate) fn effect(run: EffectFn) -> Self {
        Self::new(
            NodeKind::Effect {
                run,
                cleanups: Vec::new(),
                runs: 0,
            },
            ReactiveFlags::WATCHING,
        )
    }

    pub(crate) fn is_computed(&self) -> bool {
        matches!(self.kind, NodeKind::Computed { .. })
    }

    #[cfg(test)]
    pub(crate) fn is_effect(&self) -> bool {
        matches!(self.kind, NodeKind::Effect { .. })
    }

    pub(crate) fn state(&self) -> NodeState {
        NodeState::from(self.flags)
    }
}

/// Reconciliation state of a node, as seen from outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// The cached value is up to date.
    Clean,

    /// A dependency might have changed. Resolved on next read.
    Pending,

    /// The node definitely needs to recompute.
    Dirty,
}

impl From<ReactiveFlags> for NodeState {
    fn from(flags: ReactiveFlags) -> Self {
        if flags.contains(ReactiveFlags::DIRTY) {
            NodeState::Dirty
        } else if flags.contains(ReactiveFlags::PENDING) {
            NodeState::Pending
        } else {
            NodeState::Clean
        }
    }
}
