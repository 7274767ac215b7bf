//! Graph nodes.

use std::fmt;

use smallvec::SmallVec;

use super::operators::NodeKind;
use super::stamp::Stamp;

/// Index of a node in its graph's arena.
///
/// Ids are never reused, so a dead id stays dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a node id from a raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        NodeId(index)
    }

    /// Get the raw index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Input list. Most nodes have at most four inputs.
pub type InputList = SmallVec<[NodeId; 4]>;

/// A node: an operation, its result stamp and its edges.
///
/// Data edges (`inputs`, `guard`, `state_after`) are mirrored in the
/// target's `uses` list, one entry per edge. Control edges (`next`,
/// `predecessor`) only exist on fixed nodes and are not uses.
#[derive(Debug, Clone)]
pub struct Node {
    /// The operation.
    pub kind: NodeKind,
    /// Static facts about the result.
    pub stamp: Stamp,
    pub(crate) inputs: InputList,
    pub(crate) guard: Option<NodeId>,
    pub(crate) state_after: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) predecessor: Option<NodeId>,
    pub(crate) uses: InputList,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, stamp: Stamp, inputs: &[NodeId]) -> Self {
        Self {
            kind,
            stamp,
            inputs: InputList::from_slice(inputs),
            guard: None,
            state_after: None,
            next: None,
            predecessor: None,
            uses: InputList::new(),
        }
    }

    /// Data inputs.
    #[inline]
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// The guard (or anchor) this node depends on.
    #[inline]
    pub fn guard(&self) -> Option<NodeId> {
        self.guard
    }

    /// Frame state describing the interpreter state after this side effect.
    #[inline]
    pub fn state_after(&self) -> Option<NodeId> {
        self.state_after
    }

    /// Control successor.
    #[inline]
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    /// Control predecessor.
    #[inline]
    pub fn predecessor(&self) -> Option<NodeId> {
        self.predecessor
    }

    /// Nodes using this one, one entry per edge.
    #[inline]
    pub fn uses(&self) -> &[NodeId] {
        &self.uses
    }

    /// Every data edge of this node: inputs, then guard, then state.
    pub(crate) fn data_edges(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs
            .iter()
            .copied()
            .chain(self.guard)
            .chain(self.state_after)
    }

    /// Retarget every data edge pointing at `from`. Returns how many changed.
    pub(crate) fn retarget(&mut self, from: NodeId, to: NodeId) -> usize {
        let mut count = 0;
        for input in self.inputs.iter_mut().filter(|i| **i == from) {
            *input = to;
            count += 1;
        }
        if self.guard == Some(from) {
            self.guard = Some(to);
            count += 1;
        }
        if self.state_after == Some(from) {
            self.state_after = Some(to);
            count += 1;
        }
        count
    }
}
