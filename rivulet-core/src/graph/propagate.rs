//! Push-phase propagation.
//!
//! When a producer's value changes, every consumer reachable from it is
//! marked `PENDING`: it *may* be stale, and the pull phase
//! (`Runtime::check_dirty`) decides later whether it really is. Reachable
//! effects are queued. A node that is already pending is not walked again,
//! so a diamond-shaped graph is visited once per node, not once per path.

use tracing::warn;

use super::link::LinkId;
use super::node::ReactiveFlags;
use super::Graph;
use crate::error::{ReactiveError, Result};

impl Graph {
    /// Mark everything downstream of the subscriber list starting at `subs`.
    pub(crate) fn propagate(&mut self, subs: Option<LinkId>) -> Result<()> {
        self.propagate_from(subs, 0)
    }

    fn propagate_from(&mut self, mut cursor: Option<LinkId>, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        while let Some(id) = cursor {
            let Some(link) = self.links.get(id) else {
                break;
            };
            let sub = link.sub;
            cursor = link.next_sub;

            let Some(node) = self.nodes.get_mut(sub) else {
                continue;
            };
            let flags = node.flags;
            // Already visited on another path, or currently evaluating and
            // therefore about to observe the new value anyway.
            if flags.intersects(ReactiveFlags::PENDING | ReactiveFlags::TRACKING) {
                continue;
            }
            // Dirty without pending: never evaluated, or its last evaluation
            // unwound. Its subscribers were not marked, so keep walking.
            if !flags.contains(ReactiveFlags::DIRTY) {
                node.flags.insert(ReactiveFlags::PENDING);
            }
            let next = node.subs;

            if flags.contains(ReactiveFlags::WATCHING) {
                self.notify(sub);
            } else if flags.contains(ReactiveFlags::MUTABLE) {
                self.propagate_from(next, depth + 1)?;
            }
        }
        Ok(())
    }

    /// Promote pending subscribers of a node whose value is now known to have
    /// changed to `DIRTY`, without walking any further.
    pub(crate) fn shallow_propagate(&mut self, subs: Option<LinkId>) {
        let mut cursor = subs;
        while let Some(id) = cursor {
            let Some(link) = self.links.get(id) else {
                break;
            };
            let sub = link.sub;
            cursor = link.next_sub;

            let Some(node) = self.nodes.get_mut(sub) else {
                continue;
            };
            let flags = node.flags;
            if flags & (ReactiveFlags::PENDING | ReactiveFlags::DIRTY) != ReactiveFlags::PENDING {
                continue;
            }
            node.flags.insert(ReactiveFlags::DIRTY);
            if flags.contains(ReactiveFlags::WATCHING) && !flags.contains(ReactiveFlags::TRACKING) {
                self.notify(sub);
            }
        }
    }

    pub(crate) fn check_depth(&self, depth: usize) -> Result<()> {
        match self.max_depth {
            Some(limit) if depth > limit => {
                warn!(target: "rivulet", limit, "dependency walk exceeded depth limit; graph may be cyclic");
                Err(ReactiveError::DepthExceeded(limit))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::{computed, effect, signal};
    use crate::graph::{NodeId, NodeState};

    fn track(graph: &mut Graph, sub: NodeId, deps: &[NodeId]) {
        graph.start_tracking(sub);
        for &dep in deps {
            graph.link(dep, sub);
        }
        graph.end_tracking(sub, false);
    }

    #[test]
    fn marks_chain_pending_and_queues_effect() {
        let mut graph = Graph::default();
        let a = signal(&mut graph, 1);
        let b = computed(&mut graph);
        let c = computed(&mut graph);
        let e = effect(&mut graph);
        track(&mut graph, b, &[a]);
        track(&mut graph, c, &[b]);
        track(&mut graph, e, &[c]);

        let subs = graph.nodes[a].subs;
        graph.propagate(subs).unwrap();

        assert_eq!(graph.nodes[b].state(), NodeState::Pending);
        assert_eq!(graph.nodes[c].state(), NodeState::Pending);
        assert_eq!(graph.nodes[e].state(), NodeState::Pending);
        assert!(graph.nodes[e].flags.contains(ReactiveFlags::QUEUED));
        assert_eq!(graph.queue.len(), 1);
    }

    #[test]
    fn diamond_is_walked_once() {
        let mut graph = Graph::default();
        let a = signal(&mut graph, 1);
        let b = computed(&mut graph);
        let c = computed(&mut graph);
        let d = computed(&mut graph);
        let e = effect(&mut graph);
        track(&mut graph, b, &[a]);
        track(&mut graph, c, &[a]);
        track(&mut graph, d, &[b, c]);
        track(&mut graph, e, &[d]);

        let subs = graph.nodes[a].subs;
        graph.propagate(subs).unwrap();

        assert_eq!(graph.nodes[d].state(), NodeState::Pending);
        assert_eq!(graph.queue.len(), 1);
    }

    #[test]
    fn tracking_nodes_are_skipped() {
        let mut graph = Graph::default();
        let a = signal(&mut graph, 1);
        let e = effect(&mut graph);
        track(&mut graph, e, &[a]);

        graph.start_tracking(e);
        graph.link(a, e);
        let subs = graph.nodes[a].subs;
        graph.propagate(subs).unwrap();
        graph.end_tracking(e, false);

        assert_eq!(graph.nodes[e].state(), NodeState::Clean);
        assert_eq!(graph.queue.len(), 0);
    }

    #[test]
    fn walks_through_dirty_computed() {
        let mut graph = Graph::default();
        let a = signal(&mut graph, 1);
        let b = computed(&mut graph);
        let e = effect(&mut graph);
        track(&mut graph, b, &[a]);
        track(&mut graph, e, &[b]);

        // As left behind by a getter that unwound.
        graph.nodes[b].flags.insert(ReactiveFlags::DIRTY);
        let subs = graph.nodes[a].subs;
        graph.propagate(subs).unwrap();

        assert_eq!(graph.nodes[b].state(), NodeState::Dirty);
        assert!(graph.nodes[e].flags.contains(ReactiveFlags::QUEUED));
    }

    #[test]
    fn shallow_propagate_only_promotes_pending() {
        let mut graph = Graph::default();
        let a = signal(&mut graph, 1);
        let b = computed(&mut graph);
        let c = computed(&mut graph);
        let d = computed(&mut graph);
        track(&mut graph, b, &[a]);
        track(&mut graph, c, &[a]);
        track(&mut graph, d, &[b]);

        graph.nodes[b].flags.insert(ReactiveFlags::PENDING);
        let subs = graph.nodes[a].subs;
        graph.shallow_propagate(subs);

        assert_eq!(graph.nodes[b].state(), NodeState::Dirty);
        // Clean siblings and deeper nodes are left alone.
        assert_eq!(graph.nodes[c].state(), NodeState::Clean);
        assert_eq!(graph.nodes[d].state(), NodeState::Clean);
    }

    #[test]
    fn depth_limit_trips() {
        let mut graph = Graph::with_max_depth(Some(1));
        let a = signal(&mut graph, 1);
        let b = computed(&mut graph);
        let c = computed(&mut graph);
        let d = computed(&mut graph);
        let e = effect(&mut graph);
        track(&mut graph, b, &[a]);
        track(&mut graph, c, &[b]);
        track(&mut graph, d, &[c]);
        track(&mut graph, e, &[d]);

        let subs = graph.nodes[a].subs;
        assert_eq!(graph.propagate(subs), Err(ReactiveError::DepthExceeded(1)));
    }
}
