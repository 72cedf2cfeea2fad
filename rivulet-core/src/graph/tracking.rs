//! Tracking sessions.
//!
//! A session brackets one evaluation of a computed getter or an effect body.
//! Links from the previous session stay in place while the body runs so that
//! [`Graph::link`] can re-confirm them where they sit; whatever was not
//! re-confirmed by the time the session ends is pruned.

use super::node::{NodeId, ReactiveFlags};
use super::Graph;

impl Graph {
    /// Open a session for `id`: rewind its dependency cursor, stamp a fresh
    /// session version and clear its dirty state.
    pub(crate) fn start_tracking(&mut self, id: NodeId) {
        self.version += 1;
        let version = self.version;
        if let Some(node) = self.nodes.get_mut(id) {
            node.version = version;
            node.deps_tail = None;
            node.flags.remove(ReactiveFlags::DIRTY | ReactiveFlags::PENDING);
            node.flags.insert(ReactiveFlags::TRACKING);
        }
    }

    /// Close the session for `id`, unlinking every dependency that was not
    /// re-confirmed after the cursor.
    ///
    /// `aborted` is set when the body unwound; a computed is then left dirty
    /// so its next read evaluates again instead of serving a stale value.
    pub(crate) fn end_tracking(&mut self, id: NodeId, aborted: bool) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.flags.remove(ReactiveFlags::TRACKING);
        if aborted && node.is_computed() {
            node.flags.insert(ReactiveFlags::DIRTY);
        }
        let mut stale = match node.deps_tail {
            Some(tail) => self.links[tail].next_dep,
            None => node.deps,
        };
        while let Some(link) = stale {
            stale = self.unlink(link);
        }
    }
}
