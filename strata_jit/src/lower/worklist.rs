//! Worklist for the lowering driver.
//!
//! FIFO in push order with deduplication. A node is offered at most once
//! per run: lowering never revisits a node it already handled or deferred,
//! which bounds the run even when handlers create new lowerable nodes.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use crate::ir::NodeId;

// =============================================================================
// Worklist
// =============================================================================

/// Nodes waiting to be offered to the dispatcher.
#[derive(Debug, Default)]
pub struct Worklist {
    /// Nodes in processing order.
    queue: VecDeque<NodeId>,
    /// Every node ever pushed during this run.
    seen: FxHashSet<NodeId>,
    /// Total nodes popped.
    total_processed: usize,
}

impl Worklist {
    /// Create an empty worklist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a worklist with initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            seen: FxHashSet::with_capacity_and_hasher(capacity, Default::default()),
            total_processed: 0,
        }
    }

    /// Push a node. Returns false if it was already pushed during this run.
    pub fn push(&mut self, node: NodeId) -> bool {
        if self.seen.insert(node) {
            self.queue.push_back(node);
            true
        } else {
            false
        }
    }

    /// Push several nodes in order.
    pub fn push_all(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        for node in nodes {
            self.push(node);
        }
    }

    /// Pop the next node.
    pub fn pop(&mut self) -> Option<NodeId> {
        let node = self.queue.pop_front()?;
        self.total_processed += 1;
        Some(node)
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of pending nodes.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Total nodes pushed during this run.
    pub fn total_added(&self) -> usize {
        self.seen.len()
    }

    /// Total nodes popped during this run.
    pub fn total_processed(&self) -> usize {
        self.total_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut wl = Worklist::new();
        wl.push_all([NodeId::new(3), NodeId::new(1), NodeId::new(2)]);
        assert_eq!(wl.pop(), Some(NodeId::new(3)));
        assert_eq!(wl.pop(), Some(NodeId::new(1)));
        assert_eq!(wl.pop(), Some(NodeId::new(2)));
        assert_eq!(wl.pop(), None);
    }

    #[test]
    fn test_dedup_while_queued() {
        let mut wl = Worklist::with_capacity(4);
        assert!(wl.push(NodeId::new(1)));
        assert!(!wl.push(NodeId::new(1)));
        assert_eq!(wl.len(), 1);
    }

    #[test]
    fn test_no_repush_after_pop() {
        let mut wl = Worklist::new();
        wl.push(NodeId::new(1));
        wl.pop();
        assert!(!wl.push(NodeId::new(1)));
        assert!(wl.is_empty());
    }

    #[test]
    fn test_counters() {
        let mut wl = Worklist::new();
        for i in 0..100 {
            wl.push(NodeId::new(i));
        }
        while wl.pop().is_some() {}
        assert_eq!(wl.total_added(), 100);
        assert_eq!(wl.total_processed(), 100);
    }
}
