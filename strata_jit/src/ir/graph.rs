//! The sea-of-nodes graph.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Fixed nodes form a
//! singly-linked control chain through `next`/`predecessor`; floating
//! nodes are scheduled later from their data edges. Every mutation keeps
//! the use lists in sync with the data edges, which is what makes
//! [`Graph::replace_all_uses`] cheap.

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use strata_core::{CompileError, CompileResult};
use tracing::debug;

use super::meta::{MetaTable, ObjectRef};
use super::node::{InputList, Node, NodeId};
use super::operators::{CommitRef, Constant, MonitorId, NodeKind};
use super::stamp::{ObjectStamp, Stamp};
use crate::lower::stage::LoweringStage;

/// The method a graph was built for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphMethod {
    /// Qualified name, for diagnostics.
    pub name: String,
    /// Number of interpreter local slots.
    pub max_locals: u32,
}

impl GraphMethod {
    /// Create method info.
    pub fn new(name: impl Into<String>, max_locals: u32) -> Self {
        Self {
            name: name.into(),
            max_locals,
        }
    }
}

/// Side data of an allocation commit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitInfo {
    /// Number of virtual objects leading the commit's inputs.
    pub object_count: usize,
    /// Locks held on each object, in acquisition order.
    pub locks: Vec<SmallVec<[MonitorId; 1]>>,
}

bitflags! {
    /// Graph-wide facts recorded by passes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GraphFlags: u8 {
        /// Collector barriers have been expanded.
        const BARRIERS_ADDED = 0x01;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ValueKey {
    kind: NodeKind,
    stamp: Stamp,
    inputs: InputList,
}

/// A compilation unit's IR.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    start: NodeId,
    stage: LoweringStage,
    method: GraphMethod,
    meta: MetaTable,
    commits: Vec<CommitInfo>,
    value_numbers: FxHashMap<ValueKey, NodeId>,
    flags: GraphFlags,
    live: usize,
}

impl Graph {
    /// Create a graph with a `Start` node.
    pub fn new(method: GraphMethod, meta: MetaTable) -> Self {
        Self::with_start(NodeKind::Start, method, meta)
    }

    /// Create an on-stack-replacement graph entered through `OsrStart`.
    pub fn new_osr(method: GraphMethod, meta: MetaTable) -> Self {
        Self::with_start(NodeKind::OsrStart, method, meta)
    }

    fn with_start(kind: NodeKind, method: GraphMethod, meta: MetaTable) -> Self {
        let mut graph = Self {
            nodes: Vec::with_capacity(64),
            start: NodeId::new(0),
            stage: LoweringStage::default(),
            method,
            meta,
            commits: Vec::new(),
            value_numbers: FxHashMap::default(),
            flags: GraphFlags::empty(),
            live: 0,
        };
        graph.start = graph.add_node(kind, Stamp::Void, &[]);
        graph
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The entry node.
    #[inline]
    pub fn start(&self) -> NodeId {
        self.start
    }

    /// Make `start` the entry node.
    pub fn set_start(&mut self, start: NodeId) {
        self.start = start;
    }

    /// Current lowering stage.
    #[inline]
    pub fn stage(&self) -> LoweringStage {
        self.stage
    }

    /// Move to a later stage.
    pub fn advance_stage(&mut self, to: LoweringStage) -> CompileResult<()> {
        self.stage.check_advance(to)?;
        if to != self.stage {
            debug!(method = %self.method.name, from = %self.stage, %to, "lowering stage");
        }
        self.stage = to;
        Ok(())
    }

    /// The method this graph compiles.
    #[inline]
    pub fn method(&self) -> &GraphMethod {
        &self.method
    }

    /// Resolved metadata.
    #[inline]
    pub fn meta(&self) -> &MetaTable {
        &self.meta
    }

    /// Resolved metadata, for graph construction.
    #[inline]
    pub fn meta_mut(&mut self) -> &mut MetaTable {
        &mut self.meta
    }

    /// Graph-wide flags.
    #[inline]
    pub fn flags(&self) -> GraphFlags {
        self.flags
    }

    /// Record graph-wide flags.
    pub fn insert_flags(&mut self, flags: GraphFlags) {
        self.flags.insert(flags);
    }

    /// Register side data for a new allocation commit.
    pub fn add_commit(&mut self, info: CommitInfo) -> CommitRef {
        self.commits.push(info);
        CommitRef(self.commits.len() as u32 - 1)
    }

    /// Side data of an allocation commit.
    pub fn commit(&self, commit: CommitRef) -> Option<&CommitInfo> {
        self.commits.get(commit.0 as usize)
    }

    /// Number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the graph has no live nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// One past the largest id ever allocated.
    #[inline]
    pub fn id_bound(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Whether `id` refers to a live node.
    #[inline]
    pub fn is_alive(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.slot()), Some(Some(_)))
    }

    /// Get a node, if live.
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot()).and_then(Option::as_ref)
    }

    /// Get a live node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is dead; callers hold ids obtained from this graph.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("dead node {id}"),
        }
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(id.slot()).and_then(Option::as_mut) {
            Some(node) => node,
            None => panic!("dead node {id}"),
        }
    }

    /// Kind of a live node.
    #[inline]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    /// Stamp of a live node.
    #[inline]
    pub fn stamp(&self, id: NodeId) -> Stamp {
        self.node(id).stamp
    }

    /// Refine the stamp of a node.
    pub fn set_stamp(&mut self, id: NodeId, stamp: Stamp) {
        self.node_mut(id).stamp = stamp;
    }

    /// Data inputs of a live node.
    #[inline]
    pub fn inputs(&self, id: NodeId) -> &[NodeId] {
        self.node(id).inputs()
    }

    /// The `index`-th input, if present.
    #[inline]
    pub fn input(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.node(id).inputs.get(index).copied()
    }

    /// Guard edge of a node.
    #[inline]
    pub fn guard(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).guard
    }

    /// Frame state edge of a node.
    #[inline]
    pub fn state_after(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).state_after
    }

    /// Control successor of a fixed node.
    #[inline]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next
    }

    /// Control predecessor of a fixed node.
    #[inline]
    pub fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).predecessor
    }

    /// Distinct users of a node, in id order.
    pub fn uses(&self, id: NodeId) -> SmallVec<[NodeId; 4]> {
        let mut uses: SmallVec<[NodeId; 4]> = self.node(id).uses.clone();
        uses.sort_unstable();
        uses.dedup();
        uses
    }

    /// Number of data edges targeting a node.
    #[inline]
    pub fn use_count(&self, id: NodeId) -> usize {
        self.node(id).uses.len()
    }

    /// Live node ids in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Iterate over live nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId::new(i as u32), n)))
    }

    /// Fixed nodes reachable from the start, in control order.
    pub fn fixed_chain(&self) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cursor = Some(self.start);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.next(id);
        }
        chain
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Add a node.
    pub fn add_node(&mut self, kind: NodeKind, stamp: Stamp, inputs: &[NodeId]) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        for &input in inputs {
            self.node_mut(input).uses.push(id);
        }
        self.nodes.push(Some(Node::new(kind, stamp, inputs)));
        self.live += 1;
        id
    }

    /// Add a node that depends on `guard`.
    pub fn add_guarded(
        &mut self,
        kind: NodeKind,
        stamp: Stamp,
        inputs: &[NodeId],
        guard: Option<NodeId>,
    ) -> NodeId {
        let id = self.add_node(kind, stamp, inputs);
        self.set_guard(id, guard);
        id
    }

    /// Add a pure node, reusing an existing equivalent one.
    pub fn unique(&mut self, kind: NodeKind, stamp: Stamp, inputs: &[NodeId]) -> NodeId {
        debug_assert!(kind.is_value_numberable(), "{kind:?} is not value numberable");
        let key = ValueKey {
            kind,
            stamp,
            inputs: InputList::from_slice(inputs),
        };
        if let Some(&existing) = self.value_numbers.get(&key) {
            if self.get(existing).is_some_and(|n| {
                n.kind == key.kind && n.stamp == key.stamp && n.inputs == key.inputs
            }) {
                return existing;
            }
        }
        let id = self.add_node(kind, stamp, inputs);
        self.value_numbers.insert(key, id);
        id
    }

    /// Add or reuse a constant node.
    pub fn constant(&mut self, value: Constant) -> NodeId {
        let stamp = match value {
            Constant::Int(v) => Stamp::int_constant(32, v as i64),
            Constant::Long(v) => Stamp::int_constant(64, v),
            Constant::Float(_) => Stamp::Float { bits: 32 },
            Constant::Double(_) => Stamp::Float { bits: 64 },
            Constant::Null => Stamp::Object(ObjectStamp::null()),
            Constant::Object(_) => Stamp::Object(ObjectStamp::unknown().as_non_null()),
            Constant::Word(_) => Stamp::Word,
        };
        self.unique(NodeKind::Constant(value), stamp, &[])
    }

    /// Add or reuse an `int` constant.
    pub fn const_int(&mut self, value: i32) -> NodeId {
        self.constant(Constant::Int(value))
    }

    /// Add or reuse a `long` constant.
    pub fn const_long(&mut self, value: i64) -> NodeId {
        self.constant(Constant::Long(value))
    }

    /// Add or reuse a heap object constant with a precise stamp.
    pub fn const_object(&mut self, object: ObjectRef, stamp: ObjectStamp) -> NodeId {
        self.unique(
            NodeKind::Constant(Constant::Object(object)),
            Stamp::Object(stamp.as_non_null()),
            &[],
        )
    }

    /// The constant value of a node, if it is a constant.
    pub fn as_constant(&self, id: NodeId) -> Option<Constant> {
        match self.kind(id) {
            NodeKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    // =========================================================================
    // Edge Mutation
    // =========================================================================

    fn unregister_use(&mut self, target: NodeId, user: NodeId) {
        if let Some(node) = self.nodes.get_mut(target.slot()).and_then(Option::as_mut) {
            if let Some(pos) = node.uses.iter().position(|u| *u == user) {
                node.uses.swap_remove(pos);
            }
        }
    }

    /// Replace the `index`-th input of a node.
    pub fn set_input(&mut self, id: NodeId, index: usize, value: NodeId) {
        let old = self.node(id).inputs[index];
        if old == value {
            return;
        }
        self.unregister_use(old, id);
        self.node_mut(id).inputs[index] = value;
        self.node_mut(value).uses.push(id);
    }

    /// Set or clear the guard edge of a node.
    pub fn set_guard(&mut self, id: NodeId, guard: Option<NodeId>) {
        let old = self.node(id).guard;
        if old == guard {
            return;
        }
        if let Some(old) = old {
            self.unregister_use(old, id);
        }
        self.node_mut(id).guard = guard;
        if let Some(guard) = guard {
            self.node_mut(guard).uses.push(id);
        }
    }

    /// Set or clear the frame state edge of a node.
    pub fn set_state_after(&mut self, id: NodeId, state: Option<NodeId>) {
        let old = self.node(id).state_after;
        if old == state {
            return;
        }
        if let Some(old) = old {
            self.unregister_use(old, id);
        }
        self.node_mut(id).state_after = state;
        if let Some(state) = state {
            self.node_mut(state).uses.push(id);
        }
    }

    /// Redirect every use of `old` to `new`.
    pub fn replace_all_uses(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        let users = std::mem::take(&mut self.node_mut(old).uses);
        let mut seen: SmallVec<[NodeId; 4]> = SmallVec::new();
        for user in users {
            if seen.contains(&user) {
                continue;
            }
            seen.push(user);
            let count = self.node_mut(user).retarget(old, new);
            let target = self.node_mut(new);
            for _ in 0..count {
                target.uses.push(user);
            }
        }
    }

    // =========================================================================
    // Control Flow
    // =========================================================================

    /// Set the control successor of a fixed node.
    pub fn set_next(&mut self, id: NodeId, next: Option<NodeId>) {
        if let Some(old) = self.node(id).next {
            self.node_mut(old).predecessor = None;
        }
        self.node_mut(id).next = next;
        if let Some(next) = next {
            self.node_mut(next).predecessor = Some(id);
        }
    }

    /// Link a fresh fixed node directly before `fixed`.
    pub fn add_before_fixed(&mut self, fixed: NodeId, new: NodeId) {
        debug_assert!(self.kind(new).is_fixed());
        if let Some(pred) = self.predecessor(fixed) {
            self.set_next(pred, Some(new));
        }
        self.set_next(new, Some(fixed));
    }

    /// Link a fresh fixed node directly after `fixed`.
    pub fn add_after_fixed(&mut self, fixed: NodeId, new: NodeId) {
        debug_assert!(self.kind(new).is_fixed());
        let next = self.next(fixed);
        self.set_next(fixed, Some(new));
        self.set_next(new, next);
    }

    fn unlink_fixed(&mut self, id: NodeId) -> (Option<NodeId>, Option<NodeId>) {
        let pred = self.predecessor(id);
        let next = self.next(id);
        self.set_next(id, None);
        if let Some(pred) = pred {
            self.set_next(pred, None);
        }
        (pred, next)
    }

    /// Put `new` in the control position of `old`, move all uses and delete `old`.
    pub fn replace_fixed_with_fixed(&mut self, old: NodeId, new: NodeId) {
        let (pred, next) = self.unlink_fixed(old);
        if let Some(pred) = pred {
            self.set_next(pred, Some(new));
        }
        self.set_next(new, next);
        if self.start == old {
            self.start = new;
        }
        self.replace_all_uses(old, new);
        self.kill(old);
    }

    /// Splice `old` out of the control chain, move uses to a floating value and delete it.
    pub fn replace_fixed_with_floating(&mut self, old: NodeId, value: NodeId) {
        let (pred, next) = self.unlink_fixed(old);
        if let Some(pred) = pred {
            self.set_next(pred, next);
        }
        self.replace_all_uses(old, value);
        self.kill(old);
    }

    /// Splice an unused fixed node out of the control chain and delete it.
    pub fn remove_fixed(&mut self, old: NodeId) -> CompileResult<()> {
        if self.use_count(old) != 0 {
            return Err(CompileError::invalid_graph(format!(
                "cannot remove {old} ({}): still has {} uses",
                self.kind(old).name(),
                self.use_count(old)
            )));
        }
        let (pred, next) = self.unlink_fixed(old);
        if let Some(pred) = pred {
            self.set_next(pred, next);
        }
        self.kill(old);
        Ok(())
    }

    /// Move all uses of a floating node to `new` and delete it.
    pub fn replace_floating(&mut self, old: NodeId, new: NodeId) {
        self.replace_all_uses(old, new);
        self.kill(old);
    }

    /// The nearest begin node at or above `fixed`.
    pub fn prev_begin(&self, fixed: NodeId) -> Option<NodeId> {
        let mut cursor = Some(fixed);
        while let Some(id) = cursor {
            if self.kind(id).is_begin() {
                return Some(id);
            }
            cursor = self.predecessor(id);
        }
        None
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Delete a node and drop its outgoing data edges.
    ///
    /// The node must be unused and, if fixed, unlinked.
    pub fn kill(&mut self, id: NodeId) {
        debug_assert!(self.node(id).uses.is_empty(), "killing used node {id}");
        let Some(node) = self.nodes.get_mut(id.slot()).and_then(Option::take) else {
            return;
        };
        for input in node.data_edges() {
            self.unregister_use(input, id);
        }
        self.live -= 1;
    }

    /// Delete a node and every floating input left without uses.
    pub fn kill_with_unused_floating_inputs(&mut self, id: NodeId) {
        let inputs: SmallVec<[NodeId; 8]> = self.node(id).data_edges().collect();
        self.kill(id);
        let mut worklist: Vec<NodeId> = inputs.into_vec();
        while let Some(candidate) = worklist.pop() {
            let Some(node) = self.get(candidate) else {
                continue;
            };
            if node.kind.is_fixed() || !node.uses.is_empty() {
                continue;
            }
            worklist.extend(node.data_edges());
            self.kill(candidate);
        }
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Check structural invariants.
    ///
    /// - every edge targets a live node and is mirrored in its use list
    /// - control links are symmetric
    /// - address nodes have exactly one user
    pub fn verify(&self) -> CompileResult<()> {
        let mut expected: FxHashMap<NodeId, FxHashMap<NodeId, usize>> = FxHashMap::default();
        for (id, node) in self.iter() {
            for target in node.data_edges() {
                if !self.is_alive(target) {
                    return Err(CompileError::invalid_graph(format!(
                        "{id} ({}) references dead node {target}",
                        node.kind.name()
                    )));
                }
                *expected.entry(target).or_default().entry(id).or_default() += 1;
            }
            if let Some(next) = node.next {
                if self.get(next).and_then(Node::predecessor) != Some(id) {
                    return Err(CompileError::invalid_graph(format!(
                        "control link {id} -> {next} is not mirrored"
                    )));
                }
            }
            if matches!(node.kind, NodeKind::Address { .. }) && node.uses.len() != 1 {
                return Err(CompileError::invalid_graph(format!(
                    "address {id} has {} uses",
                    node.uses.len()
                )));
            }
        }
        for (id, node) in self.iter() {
            let mut actual: FxHashMap<NodeId, usize> = FxHashMap::default();
            for user in &node.uses {
                *actual.entry(*user).or_default() += 1;
            }
            let empty = FxHashMap::default();
            if &actual != expected.get(&id).unwrap_or(&empty) {
                return Err(CompileError::invalid_graph(format!(
                    "use list of {id} ({}) is out of sync",
                    node.kind.name()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
