//! Implicit-exception guards: null checks and array bounds checks.
//!
//! A guard is skipped only when the stamps already prove the property it
//! would check.

use strata_core::{GuardKind, JavaKind};
use strata_gc::BarrierType;
use tracing::trace;

use super::address::field_address;
use super::tool::LoweringTool;
use crate::ir::{Constant, Graph, LocationIdentity, NodeId, NodeKind, Stamp};

/// Guard `object` against null before `before`.
///
/// Returns `None` when the object's stamp is already non-null.
pub fn create_null_check(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    object: NodeId,
    before: NodeId,
) -> Option<NodeId> {
    if graph.stamp(object).is_non_null() {
        return None;
    }
    let condition = graph.unique(NodeKind::IsNull, Stamp::Condition, &[object]);
    let (reason, action) = GuardKind::NullCheck.deopt();
    Some(tool.create_guard(graph, before, condition, reason, action, true))
}

/// Statically known length of `array`, without reading memory.
pub fn known_array_length(graph: &mut Graph, array: NodeId) -> Option<NodeId> {
    match graph.kind(array) {
        NodeKind::NewArray { .. } | NodeKind::DynamicNewArray => {
            graph.inputs(array).last().copied()
        }
        NodeKind::VirtualArray { length, .. } => Some(graph.const_int(length as i32)),
        NodeKind::AllocatedObject | NodeKind::FixedValueAnchor => {
            let inner = graph.input(array, 0)?;
            known_array_length(graph, inner)
        }
        NodeKind::Constant(Constant::Object(object)) => {
            let length = graph.meta().array_length(object)?;
            Some(graph.const_int(length))
        }
        _ => None,
    }
}

/// Read the length of `array` before `before`, null-checking the array.
pub fn create_array_length_read(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    array: NodeId,
    before: NodeId,
) -> NodeId {
    let address = field_address(graph, array, tool.config.array_length_offset);
    let read = graph.add_node(
        NodeKind::Read {
            kind: JavaKind::Int,
            identity: LocationIdentity::ArrayLength,
            barrier: BarrierType::None,
        },
        Stamp::positive_int(),
        &[address],
    );
    graph.add_before_fixed(before, read);
    let guard = create_null_check(graph, tool, array, read);
    graph.set_guard(read, guard);
    read
}

/// Guard `0 <= index < length(array)` before the access `before`.
///
/// Returns `None` when both index and length are constants proving the
/// access in range.
pub fn create_bounds_check(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    before: NodeId,
    array: NodeId,
    index: NodeId,
) -> Option<NodeId> {
    let length = match known_array_length(graph, array) {
        Some(length) => length,
        None => create_array_length_read(graph, tool, array, before),
    };

    let constant_index = graph.as_constant(index).and_then(|c| c.as_i64());
    let constant_length = graph.as_constant(length).and_then(|c| c.as_i64());
    if let (Some(i), Some(n)) = (constant_index, constant_length) {
        if 0 <= i && i < n {
            trace!(%before, index = i, length = n, "bounds check folded");
            return None;
        }
    }

    let condition = graph.unique(NodeKind::IntegerBelow, Stamp::Condition, &[index, length]);
    let (reason, action) = GuardKind::BoundsCheck.deopt();
    Some(tool.create_guard(graph, before, condition, reason, action, false))
}
