//! Materialization of deferred allocations.
//!
//! Escape analysis leaves behind commits: a fixed point where a set of
//! virtual objects must become real, with their field values and held
//! locks. Objects of one commit may reference each other in any order,
//! including cycles.
//!
//! 1. Allocate each object in order and write each non-default entry
//!    right after its allocation. An entry naming an object of this commit
//!    that is not allocated yet is deferred.
//! 2. Write the deferred entries once every object exists.
//! 3. Pin each allocation with an anchor, replay held locks, redirect
//!    `AllocatedObject` uses and remove the commit.
//! 4. Publish with a store-store fence (plus load-store when a final
//!    field is involved).

use smallvec::SmallVec;
use strata_core::{CompileError, CompileResult, JavaKind};
use strata_gc::{AccessOp, AccessShape, BarrierType};
use tracing::debug;

use super::address::{create_address, AddressParts};
use super::convert::implicit_store_convert;
use super::tool::LoweringTool;
use super::LowerOutcome;
use crate::ir::{
    CommitRef, Graph, LocationIdentity, MemoryBarriers, MonitorId, NodeId, NodeKind, Stamp,
    TypeRef,
};

/// One entry slot of a virtual object.
#[derive(Debug, Clone, Copy)]
struct EntrySlot {
    kind: JavaKind,
    displacement: i64,
}

#[derive(Debug, Clone, Copy)]
enum VirtualShape {
    Instance { ty: TypeRef },
    Array { ty: TypeRef, element: JavaKind, length: u32 },
}

impl VirtualShape {
    fn of(graph: &Graph, virtual_object: NodeId) -> CompileResult<Self> {
        match graph.kind(virtual_object) {
            NodeKind::VirtualInstance { ty } => Ok(VirtualShape::Instance { ty }),
            NodeKind::VirtualArray {
                ty,
                element,
                length,
            } => Ok(VirtualShape::Array {
                ty,
                element,
                length,
            }),
            other => Err(CompileError::invalid_graph(format!(
                "commit input {virtual_object} is {}, not a virtual object",
                other.name()
            ))),
        }
    }

    fn is_array(self) -> bool {
        matches!(self, VirtualShape::Array { .. })
    }

    fn entries(self, graph: &Graph, tool: &LoweringTool<'_>) -> Vec<EntrySlot> {
        match self {
            VirtualShape::Instance { ty } => graph
                .meta()
                .ty(ty)
                .instance_fields
                .iter()
                .map(|f| {
                    let field = graph.meta().field(*f);
                    EntrySlot {
                        kind: field.kind,
                        displacement: field.offset as i64,
                    }
                })
                .collect(),
            VirtualShape::Array {
                element, length, ..
            } => {
                let base = tool.config.array_base_offset(element) as i64;
                let scale = tool.config.array_index_scale(element) as i64;
                (0..length as i64)
                    .map(|i| EntrySlot {
                        kind: element,
                        displacement: base + i * scale,
                    })
                    .collect()
            }
        }
    }
}

struct CommitPlan {
    virtuals: Vec<NodeId>,
    values: Vec<NodeId>,
    shapes: Vec<VirtualShape>,
    entries: Vec<Vec<EntrySlot>>,
    locks: Vec<SmallVec<[MonitorId; 1]>>,
}

impl CommitPlan {
    fn build(
        graph: &Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
        commit: CommitRef,
    ) -> CompileResult<Self> {
        let Some(info) = graph.commit(commit) else {
            return Err(CompileError::invalid_graph(format!(
                "commit {node} has no side data"
            )));
        };
        let inputs = graph.inputs(node);
        if inputs.len() < info.object_count {
            return Err(CompileError::invalid_graph(format!(
                "commit {node} has fewer inputs than objects"
            )));
        }
        let virtuals = inputs[..info.object_count].to_vec();
        let values = inputs[info.object_count..].to_vec();
        let shapes = virtuals
            .iter()
            .map(|v| VirtualShape::of(graph, *v))
            .collect::<CompileResult<Vec<_>>>()?;
        let entries: Vec<Vec<EntrySlot>> = shapes.iter().map(|s| s.entries(graph, tool)).collect();
        let expected: usize = entries.iter().map(Vec::len).sum();
        if expected != values.len() {
            return Err(CompileError::invalid_graph(format!(
                "commit {node} has {} values for {expected} entries",
                values.len()
            )));
        }
        let mut locks = info.locks.clone();
        locks.resize(virtuals.len(), SmallVec::new());
        Ok(Self {
            virtuals,
            values,
            shapes,
            entries,
            locks,
        })
    }

    fn object_index(&self, value: NodeId) -> Option<usize> {
        self.virtuals.iter().position(|v| *v == value)
    }
}

fn is_default_value(graph: &Graph, value: NodeId) -> bool {
    graph
        .as_constant(value)
        .is_some_and(|c| c.is_default_for_kind())
}

fn allocate(graph: &mut Graph, shape: VirtualShape, stamp: Stamp) -> NodeId {
    match shape {
        VirtualShape::Instance { ty } => graph.add_node(
            NodeKind::NewInstance {
                ty,
                fill_contents: true,
            },
            stamp,
            &[],
        ),
        VirtualShape::Array {
            ty,
            element,
            length,
        } => {
            let length = graph.const_int(length as i32);
            graph.add_node(
                NodeKind::NewArray {
                    ty,
                    element,
                    fill_contents: true,
                },
                stamp,
                &[length],
            )
        }
    }
}

fn entry_write(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    object: NodeId,
    slot: EntrySlot,
    value: NodeId,
    barrier: BarrierType,
) -> NodeId {
    let value_kind = graph.stamp(value).java_kind();
    let access_kind = if value_kind.stack_kind() == slot.kind.stack_kind() {
        slot.kind
    } else {
        value_kind
    };
    let converted = implicit_store_convert(
        graph,
        tool.config,
        access_kind,
        value,
        access_kind.is_object(),
    );
    let address = create_address(graph, object, AddressParts::displacement(slot.displacement));
    graph.add_node(
        NodeKind::Write {
            kind: access_kind,
            identity: LocationIdentity::Init,
            barrier,
            init: true,
        },
        Stamp::Void,
        &[address, converted],
    )
}

/// Lower an allocation commit. Requires frame states to be assigned.
pub fn lower_commit_allocation(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    commit: CommitRef,
) -> CompileResult<LowerOutcome> {
    if !graph.stage().frame_states_assigned() {
        return Ok(LowerOutcome::Deferred);
    }
    let plan = CommitPlan::build(graph, tool, node, commit)?;
    let count = plan.virtuals.len();
    let mut allocations: Vec<Option<NodeId>> = vec![None; count];
    let mut deferred: Vec<(usize, EntrySlot, usize)> = Vec::new();

    let mut position = 0;
    for object in 0..count {
        let stamp = graph.stamp(plan.virtuals[object]);
        let new_object = allocate(graph, plan.shapes[object], stamp);
        graph.add_before_fixed(node, new_object);
        allocations[object] = Some(new_object);

        let shape = AccessShape::Init {
            array: plan.shapes[object].is_array(),
        };
        for &slot in &plan.entries[object] {
            let value = plan.values[position];
            position += 1;
            let resolved = match plan.object_index(value) {
                Some(target) => match allocations[target] {
                    Some(allocation) => allocation,
                    None => {
                        deferred.push((object, slot, target));
                        continue;
                    }
                },
                None => value,
            };
            if is_default_value(graph, resolved) {
                continue;
            }
            let barrier = tool.barriers.select(shape, slot.kind, AccessOp::Store);
            let write = entry_write(graph, tool, new_object, slot, resolved, barrier);
            graph.add_after_fixed(new_object, write);
        }
    }

    let allocations: Vec<NodeId> = allocations.into_iter().flatten().collect();
    for (object, slot, target) in deferred {
        let shape = if plan.shapes[object].is_array() {
            AccessShape::ArrayElement
        } else {
            AccessShape::Field { referent: false }
        };
        let barrier = tool.barriers.select(shape, slot.kind, AccessOp::Store);
        let write = entry_write(
            graph,
            tool,
            allocations[object],
            slot,
            allocations[target],
            barrier,
        );
        graph.add_before_fixed(node, write);
        debug!(%write, object, target, "deferred commit entry");
    }

    let mut anchors = Vec::with_capacity(count);
    for &allocation in &allocations {
        let stamp = graph.stamp(allocation);
        let anchor = graph.add_node(NodeKind::FixedValueAnchor, stamp, &[allocation]);
        graph.add_before_fixed(node, anchor);
        anchors.push(anchor);
    }

    for (object, locks) in plan.locks.iter().enumerate() {
        for &lock in locks {
            let enter = graph.add_node(
                NodeKind::MonitorEnter { lock },
                Stamp::Void,
                &[anchors[object]],
            );
            graph.set_state_after(enter, graph.state_after(node));
            graph.add_before_fixed(node, enter);
        }
    }

    for user in graph.uses(node) {
        if graph.kind(user) != NodeKind::AllocatedObject {
            return Err(CompileError::invalid_graph(format!(
                "commit {node} is used by {} {user}",
                graph.kind(user).name()
            )));
        }
        let Some(object) = graph.input(user, 0).and_then(|v| plan.object_index(v)) else {
            return Err(CompileError::invalid_graph(format!(
                "allocated object {user} does not belong to commit {node}"
            )));
        };
        graph.replace_floating(user, anchors[object]);
    }

    insert_publication_fence(graph, node, &plan);
    graph.remove_fixed(node)?;
    for virtual_object in plan.virtuals {
        if graph.is_alive(virtual_object) && graph.use_count(virtual_object) == 0 {
            graph.kill(virtual_object);
        }
    }
    debug!(%node, objects = count, "allocation committed");
    Ok(LowerOutcome::Lowered)
}

fn insert_publication_fence(graph: &mut Graph, node: NodeId, plan: &CommitPlan) {
    let mut barriers = MemoryBarriers::STORE_STORE;
    let has_final = plan.shapes.iter().any(|shape| match shape {
        VirtualShape::Instance { ty } => graph.meta().has_final_fields(*ty),
        VirtualShape::Array { .. } => false,
    });
    if has_final {
        barriers |= MemoryBarriers::LOAD_STORE;
    }
    let fence = graph.add_node(NodeKind::Membar(barriers), Stamp::Void, &[]);
    graph.add_after_fixed(node, fence);
}

#[cfg(test)]
#[path = "commit_tests.rs"]
mod tests;
