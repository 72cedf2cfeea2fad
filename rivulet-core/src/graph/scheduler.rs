//! Effect Queue
//!
//! Effects reached by propagation are not run on the spot; they are appended
//! to a FIFO queue and drained once the triggering write (or the outermost
//! batch) completes.
//!
//! # Draining
//!
//! The queue is drained through a cursor into a slot vector instead of by
//! popping a live list. An effect disposed while the drain is in progress
//! (including one disposing itself from inside its own body) only blanks its
//! slot, so the cursor never skips or repeats an entry. Effects queued during
//! the drain land after the cursor and are picked up by the same drain.

use super::node::{NodeId, ReactiveFlags};
use super::Graph;

/// FIFO of effects awaiting a run.
#[derive(Debug, Default)]
pub(crate) struct EffectQueue {
    slots: Vec<Option<NodeId>>,
    cursor: usize,
}

impl EffectQueue {
    pub(crate) fn push(&mut self, id: NodeId) {
        self.slots.push(Some(id));
    }

    /// Next live entry, or `None` once the queue is exhausted. An exhausted
    /// queue resets itself so the slot vector does not grow across flushes.
    pub(crate) fn pop(&mut self) -> Option<NodeId> {
        while self.cursor < self.slots.len() {
            let slot = self.slots[self.cursor].take();
            self.cursor += 1;
            if slot.is_some() {
                return slot;
            }
        }
        self.slots.clear();
        self.cursor = 0;
        None
    }

    /// Blank every not-yet-drained entry for `id`.
    pub(crate) fn remove(&mut self, id: NodeId) {
        for slot in &mut self.slots[self.cursor..] {
            if *slot == Some(id) {
                *slot = None;
            }
        }
    }

    /// Number of live entries still waiting to run.
    pub(crate) fn len(&self) -> usize {
        self.slots[self.cursor..].iter().flatten().count()
    }
}

impl Graph {
    /// Queue an effect unless it is already waiting.
    pub(crate) fn notify(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.flags.contains(ReactiveFlags::QUEUED) {
            return;
        }
        node.flags.insert(ReactiveFlags::QUEUED);
        self.queue.push(id);
    }

    /// Take the next queued effect, clearing its `QUEUED` bit before it runs
    /// so that anything the run triggers can queue it again.
    ///
    /// Returns the effect together with its flags at dequeue time.
    pub(crate) fn next_queued(&mut self) -> Option<(NodeId, ReactiveFlags)> {
        while let Some(id) = self.queue.pop() {
            if let Some(node) = self.nodes.get_mut(id) {
                node.flags.remove(ReactiveFlags::QUEUED);
                return Some((id, node.flags));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::effect;

    #[test]
    fn notify_deduplicates() {
        let mut graph = Graph::default();
        let e = effect(&mut graph);

        graph.notify(e);
        graph.notify(e);
        graph.notify(e);

        assert_eq!(graph.queue.len(), 1);
        assert!(graph.nodes[e].flags.contains(ReactiveFlags::QUEUED));
    }

    #[test]
    fn drains_in_enqueue_order() {
        let mut graph = Graph::default();
        let e1 = effect(&mut graph);
        let e2 = effect(&mut graph);
        let e3 = effect(&mut graph);

        graph.notify(e2);
        graph.notify(e3);
        graph.notify(e1);

        let order: Vec<NodeId> = std::iter::from_fn(|| graph.next_queued().map(|(id, _)| id)).collect();
        assert_eq!(order, vec![e2, e3, e1]);
        assert!(!graph.nodes[e1].flags.contains(ReactiveFlags::QUEUED));
    }

    #[test]
    fn dequeued_effect_can_be_queued_again() {
        let mut graph = Graph::default();
        let e1 = effect(&mut graph);
        let e2 = effect(&mut graph);

        graph.notify(e1);
        graph.notify(e2);

        let (first, _) = graph.next_queued().unwrap();
        assert_eq!(first, e1);
        // e1 re-queues while e2 is still waiting.
        graph.notify(e1);

        assert_eq!(graph.next_queued().map(|(id, _)| id), Some(e2));
        assert_eq!(graph.next_queued().map(|(id, _)| id), Some(e1));
        assert_eq!(graph.next_queued(), None);
    }

    #[test]
    fn removal_mid_drain_skips_only_the_removed_entry() {
        let mut graph = Graph::default();
        let e1 = effect(&mut graph);
        let e2 = effect(&mut graph);
        let e3 = effect(&mut graph);

        graph.notify(e1);
        graph.notify(e2);
        graph.notify(e3);

        assert_eq!(graph.next_queued().map(|(id, _)| id), Some(e1));
        drop(graph.remove_node(e2));
        assert_eq!(graph.queue.len(), 1);

        assert_eq!(graph.next_queued().map(|(id, _)| id), Some(e3));
        assert_eq!(graph.next_queued(), None);
    }

    #[test]
    fn exhausted_queue_resets() {
        let mut queue = EffectQueue::default();
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.len(), 0);
        assert!(queue.slots.is_empty());
    }
}
