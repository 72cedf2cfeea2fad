//! Dependency Graph
//!
//! This module implements the storage side of the reactive engine: the node
//! arena, the link table that connects producers to consumers, push-phase
//! propagation, tracking sessions, and the effect queue.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph where:
//!
//! - Nodes are signals (sources), computeds (derived) or effects (sinks)
//! - Each edge is a [`Link`](link::Link) owned jointly by the consumer's
//!   dependency list and the producer's subscriber list
//!
//! # Design Decisions
//!
//! 1. Edges are intrusive doubly-linked list entries rather than per-node
//!    hash sets. Appending, re-confirming and removing an edge are O(1), and
//!    a tracking session can re-confirm last run's edges in place.
//!
//! 2. Nodes and links live in generation-checked arenas and reference each
//!    other by key, never by pointer. A stale key resolves to nothing.
//!
//! 3. Nothing in this module runs user code. Operations that call getters,
//!    effect bodies or equality predicates live in
//!    [`Runtime`](crate::Runtime), which only borrows the graph in between.
//!
//! Cycles are a caller error. They are not detected here, but
//! [`RuntimeConfig::max_depth`](crate::RuntimeConfig::max_depth) bounds the
//! recursion they would otherwise cause.

mod link;
mod node;
mod propagate;
mod scheduler;
mod tracking;

use slotmap::SlotMap;

use link::{Link, LinkId};

pub(crate) use node::{erase_equality, Cleanup, EffectFn, Equality, Getter, Node, NodeKind, Value};
pub use node::{NodeId, NodeState, ReactiveFlags};
pub(crate) use scheduler::EffectQueue;

use crate::error::{ReactiveError, Result};

/// Arena of nodes and links plus the pending effect queue.
#[derive(Default)]
pub(crate) struct Graph {
    pub(crate) nodes: SlotMap<NodeId, Node>,
    pub(crate) links: SlotMap<LinkId, Link>,
    pub(crate) queue: EffectQueue,
    /// Monotonic tracking-session counter.
    version: u64,
    max_depth: Option<usize>,
}

impl Graph {
    pub(crate) fn with_max_depth(max_depth: Option<usize>) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(ReactiveError::Disposed(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or(ReactiveError::Disposed(id))
    }

    /// Total number of live nodes.
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Node constructors for graph-level tests.

    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    pub(crate) fn signal(graph: &mut Graph, value: i32) -> NodeId {
        graph.insert(Node::signal(
            Rc::new(value),
            erase_equality(|a: &i32, b: &i32| a == b),
        ))
    }

    pub(crate) fn computed(graph: &mut Graph) -> NodeId {
        let getter: Getter = Rc::new(RefCell::new(|_: Option<&dyn Any>| -> Value { Rc::new(0i32) }));
        graph.insert(Node::computed(getter, erase_equality(|a: &i32, b: &i32| a == b)))
    }

    pub(crate) fn effect(graph: &mut Graph) -> NodeId {
        let run: EffectFn = Rc::new(RefCell::new(|| {}));
        graph.insert(Node::effect(run))
    }
}
