//! Link Table
//!
//! Every edge between a producer (`dep`) and a consumer (`sub`) is one
//! [`Link`], threaded onto two intrusive doubly-linked lists at once: the
//! consumer's dependency list and the producer's subscriber list. Links live
//! in an arena and refer to each other by [`LinkId`], so removing a link while
//! a walk is in progress can never leave a dangling pointer behind; at worst a
//! walk observes a stale id and stops.

use slotmap::new_key_type;
use tracing::debug;

use super::node::{Node, NodeId, NodeKind, ReactiveFlags};
use super::Graph;

new_key_type! {
    /// Arena key of a [`Link`].
    pub(crate) struct LinkId;
}

/// An edge `dep -> sub`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Link {
    /// Tracking session of `sub` that last confirmed this edge.
    pub(crate) version: u64,
    pub(crate) dep: NodeId,
    pub(crate) sub: NodeId,
    pub(crate) prev_sub: Option<LinkId>,
    pub(crate) next_sub: Option<LinkId>,
    pub(crate) prev_dep: Option<LinkId>,
    pub(crate) next_dep: Option<LinkId>,
}

impl Graph {
    /// Record that `sub` read `dep` during its current tracking session.
    ///
    /// Reading the same producer twice in a row, or re-reading the producer
    /// that sat at the same position in the previous session, reuses the
    /// existing link. Otherwise a new link is spliced in right after the
    /// session cursor and appended to `dep`'s subscriber list.
    pub(crate) fn link(&mut self, dep: NodeId, sub: NodeId) {
        if dep == sub || !self.nodes.contains_key(dep) {
            return;
        }
        let Some(sub_node) = self.nodes.get(sub) else {
            return;
        };
        let session = sub_node.version;
        let prev_dep = sub_node.deps_tail;

        if let Some(prev) = prev_dep {
            if self.links[prev].dep == dep {
                return;
            }
        }

        let next_dep = match prev_dep {
            Some(prev) => self.links[prev].next_dep,
            None => sub_node.deps,
        };
        if let Some(next) = next_dep {
            if self.links[next].dep == dep {
                self.links[next].version = session;
                self.nodes[sub].deps_tail = Some(next);
                return;
            }
        }

        let prev_sub = self.nodes[dep].subs_tail;
        if let Some(prev) = prev_sub {
            let last = &self.links[prev];
            if last.sub == sub && last.version == session {
                return;
            }
        }

        let id = self.links.insert(Link {
            version: session,
            dep,
            sub,
            prev_sub,
            next_sub: None,
            prev_dep,
            next_dep,
        });

        if let Some(next) = next_dep {
            self.links[next].prev_dep = Some(id);
        }
        match prev_dep {
            Some(prev) => self.links[prev].next_dep = Some(id),
            None => self.nodes[sub].deps = Some(id),
        }
        self.nodes[sub].deps_tail = Some(id);

        match prev_sub {
            Some(prev) => self.links[prev].next_sub = Some(id),
            None => self.nodes[dep].subs = Some(id),
        }
        self.nodes[dep].subs_tail = Some(id);
    }

    /// Remove a link from both lists. Returns the link that followed it in
    /// the consumer's dependency list.
    ///
    /// If this drops the producer's subscriber count to zero, the producer is
    /// torn down (see [`Graph::unwatched`]).
    pub(crate) fn unlink(&mut self, id: LinkId) -> Option<LinkId> {
        let link = self.links.remove(id)?;

        if let Some(next) = link.next_dep {
            self.links[next].prev_dep = link.prev_dep;
        }
        if let Some(prev) = link.prev_dep {
            self.links[prev].next_dep = link.next_dep;
        }
        if let Some(sub) = self.nodes.get_mut(link.sub) {
            if sub.deps == Some(id) {
                sub.deps = link.next_dep;
            }
            if sub.deps_tail == Some(id) {
                sub.deps_tail = link.prev_dep;
            }
        }

        if let Some(next) = link.next_sub {
            self.links[next].prev_sub = link.prev_sub;
        }
        if let Some(prev) = link.prev_sub {
            self.links[prev].next_sub = link.next_sub;
        }
        let orphaned = match self.nodes.get_mut(link.dep) {
            Some(dep) => {
                if dep.subs == Some(id) {
                    dep.subs = link.next_sub;
                }
                if dep.subs_tail == Some(id) {
                    dep.subs_tail = link.prev_sub;
                }
                dep.subs.is_none()
            }
            None => false,
        };
        if orphaned {
            self.unwatched(link.dep);
        }

        link.next_dep
    }

    /// Unlink `id` from every producer it reads.
    pub(crate) fn unlink_deps(&mut self, id: NodeId) {
        let mut cursor = self.nodes.get(id).and_then(|node| node.deps);
        while let Some(link) = cursor {
            cursor = self.unlink(link);
        }
    }

    /// Unlink every consumer reading `id`.
    pub(crate) fn unlink_subs(&mut self, id: NodeId) {
        while let Some(link) = self.nodes.get(id).and_then(|node| node.subs) {
            self.unlink(link);
        }
    }

    /// Teardown for a node whose last subscriber just went away.
    ///
    /// A computed drops all of its own dependencies, which may cascade into
    /// producers that only it was reading, and is left dirty so the next read
    /// re-evaluates and re-links it. Signals have nothing to release.
    pub(crate) fn unwatched(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if !node.is_computed() || node.deps.is_none() {
            return;
        }
        node.flags = (node.flags & ReactiveFlags::TRACKING)
            | ReactiveFlags::MUTABLE
            | ReactiveFlags::DIRTY;
        debug!(target: "rivulet", node = ?id, "computed unwatched, releasing dependencies");
        self.unlink_deps(id);
    }

    /// Detach `id` from the graph entirely and hand back its record.
    ///
    /// The record is returned rather than dropped so the caller can drop the
    /// user closures and values it owns after releasing its borrow of the
    /// graph. Returns `None` if the node was already disposed.
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        if !self.nodes.contains_key(id) {
            return None;
        }
        self.queue.remove(id);
        self.unlink_deps(id);
        self.unlink_subs(id);
        let mut node = self.nodes.remove(id)?;
        if let NodeKind::Effect { .. } = node.kind {
            node.flags.remove(ReactiveFlags::WATCHING | ReactiveFlags::QUEUED);
        }
        Some(node)
    }

    /// Number of consumers currently linked to `id`.
    pub(crate) fn subscriber_count(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut cursor = self.nodes.get(id).and_then(|node| node.subs);
        while let Some(link) = cursor {
            count += 1;
            cursor = self.links[link].next_sub;
        }
        count
    }

    /// Number of producers `id` is currently linked to.
    pub(crate) fn dependency_count(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut cursor = self.nodes.get(id).and_then(|node| node.deps);
        while let Some(link) = cursor {
            count += 1;
            cursor = self.links[link].next_dep;
        }
        count
    }
}
