//! Lowering of field, array, atomic, unsafe and header accesses.
//!
//! Each handler replaces a high-level access with a `Read`/`Write` through
//! a fresh address node, attaches the guard that protects it, and wraps
//! the value in the implicit conversions its kind requires.

use strata_core::{CompileError, CompileResult, JavaKind};
use strata_gc::{AccessOp, AccessShape, BarrierType, ReceiverShape};
use tracing::debug;

use super::address::{array_address, create_address, decompose_offset, field_address, AddressParts};
use super::convert::{
    compress_klass, hub_stamp, implicit_load_convert, implicit_store_convert, load_stamp,
    uncompress_klass,
};
use super::guards::{create_bounds_check, create_null_check};
use super::tool::LoweringTool;
use super::LowerOutcome;
use crate::ir::{
    Constant, FieldRef, Graph, LocationIdentity, MemoryBarriers, MethodRef, NodeId, NodeKind,
    ObjectStamp, Stamp,
};

// =============================================================================
// Shared Helpers
// =============================================================================

fn required_input(graph: &Graph, node: NodeId, index: usize) -> CompileResult<NodeId> {
    graph.input(node, index).ok_or_else(|| {
        CompileError::invalid_graph(format!(
            "{node} ({}) is missing input {index}",
            graph.kind(node).name()
        ))
    })
}

/// What barrier selection knows about the object an atomic or unsafe
/// access targets. `java.lang.Object` and interface types (arrays are
/// `Cloneable` and `Serializable`) may be arrays.
pub fn receiver_shape(graph: &Graph, object: NodeId) -> ReceiverShape {
    let is_array = graph
        .stamp(object)
        .object_stamp()
        .and_then(|s| s.ty)
        .map(|t| {
            let ty = graph.meta().ty(t);
            ty.is_array || ty.is_java_lang_object || ty.is_interface
        });
    ReceiverShape::from_type(is_array)
}

fn surround_with_fences(
    graph: &mut Graph,
    access: NodeId,
    pre: MemoryBarriers,
    post: MemoryBarriers,
) {
    let before = graph.add_node(NodeKind::Membar(pre), Stamp::Void, &[]);
    graph.add_before_fixed(access, before);
    let after = graph.add_node(NodeKind::Membar(post), Stamp::Void, &[]);
    graph.add_after_fixed(access, after);
}

/// Read the class-metadata pointer of `object`, decoding it if compressed.
pub fn create_read_hub(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    object: NodeId,
    guard: Option<NodeId>,
) -> NodeId {
    let address = field_address(graph, object, tool.config.hub_offset);
    let read = graph.add_guarded(
        NodeKind::FloatingRead {
            kind: JavaKind::Word,
            identity: LocationIdentity::Final,
        },
        hub_stamp(tool.config),
        &[address],
        guard,
    );
    uncompress_klass(graph, tool.config, read)
}

/// Create (but do not link) a read of `method`'s dispatch-table entry in `hub`.
pub fn create_read_virtual_method(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    hub: NodeId,
    method: MethodRef,
) -> CompileResult<NodeId> {
    let Some(slot) = graph.meta().method(method).vtable_index else {
        return Err(CompileError::missing_vtable_slot(qualified_name(graph, method)));
    };
    let address = field_address(graph, hub, tool.config.vtable_entry_offset(slot));
    Ok(graph.add_node(
        NodeKind::Read {
            kind: JavaKind::Word,
            identity: LocationIdentity::Any,
            barrier: BarrierType::None,
        },
        Stamp::Word,
        &[address],
    ))
}

pub(crate) fn qualified_name(graph: &Graph, method: MethodRef) -> String {
    let method = graph.meta().method(method);
    format!("{}.{}", graph.meta().ty(method.holder).name, method.name)
}

// =============================================================================
// Fields
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct FieldAccess {
    field: FieldRef,
    kind: JavaKind,
    offset: i32,
    is_static: bool,
    is_volatile: bool,
    referent: bool,
}

impl FieldAccess {
    fn resolve(graph: &Graph, field: FieldRef) -> Self {
        let meta = graph.meta();
        let f = meta.field(field);
        Self {
            field,
            kind: f.kind,
            offset: f.offset,
            is_static: f.is_static,
            is_volatile: f.is_volatile,
            referent: meta.is_referent_field(field),
        }
    }

    fn shape(&self) -> AccessShape {
        AccessShape::Field {
            referent: self.referent,
        }
    }
}

/// The object a field access goes through: the receiver, or the holder's
/// class mirror for static fields.
fn field_base(graph: &mut Graph, node: NodeId, access: &FieldAccess) -> CompileResult<NodeId> {
    if !access.is_static {
        return required_input(graph, node, 0);
    }
    let holder = graph.meta().field(access.field).holder;
    let Some(mirror) = graph.meta().ty(holder).mirror else {
        return Err(CompileError::invalid_graph(format!(
            "static field holder {} has no mirror",
            graph.meta().ty(holder).name
        )));
    };
    Ok(graph.const_object(mirror, ObjectStamp::unknown()))
}

/// Constant a static final load folds to, if any.
///
/// Default values only fold when final defaults are trusted.
fn folded_static_final(graph: &Graph, tool: &LoweringTool<'_>, field: FieldRef) -> Option<Constant> {
    let meta = graph.meta();
    let f = meta.field(field);
    if !f.is_static || !f.is_final || !meta.ty(f.holder).is_initialized {
        return None;
    }
    let value = f.constant_value?;
    if value.is_default_for_kind() && !tool.options.trust_final_default_fields {
        return None;
    }
    Some(value)
}

/// Lower a field load.
pub fn lower_load_field(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    field: FieldRef,
) -> CompileResult<LowerOutcome> {
    if let Some(value) = folded_static_final(graph, tool, field) {
        let constant = graph.constant(value);
        graph.replace_fixed_with_floating(node, constant);
        debug!(%node, %constant, "static final load folded");
        return Ok(LowerOutcome::Lowered);
    }

    let access = FieldAccess::resolve(graph, field);
    let object = field_base(graph, node, &access)?;
    let barrier = tool
        .barriers
        .select(access.shape(), access.kind, AccessOp::Load);
    let compressible = access.kind.is_object();
    let stamp = load_stamp(tool.config, access.kind, compressible, graph.stamp(node));

    let address = field_address(graph, object, access.offset);
    let read = graph.add_node(
        NodeKind::Read {
            kind: access.kind,
            identity: LocationIdentity::Field(field),
            barrier,
        },
        stamp,
        &[address],
    );
    let value = implicit_load_convert(graph, tool.config, access.kind, read, compressible);
    graph.replace_all_uses(node, value);
    graph.replace_fixed_with_fixed(node, read);

    if !access.is_static {
        let guard = create_null_check(graph, tool, object, read);
        graph.set_guard(read, guard);
    }
    if access.is_volatile {
        surround_with_fences(
            graph,
            read,
            MemoryBarriers::JMM_PRE_VOLATILE_READ,
            MemoryBarriers::JMM_POST_VOLATILE_READ,
        );
    }
    Ok(LowerOutcome::Lowered)
}

/// Lower a field store.
pub fn lower_store_field(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    field: FieldRef,
) -> CompileResult<LowerOutcome> {
    let access = FieldAccess::resolve(graph, field);
    let object = field_base(graph, node, &access)?;
    let value_index = if access.is_static { 0 } else { 1 };
    let value = required_input(graph, node, value_index)?;

    let barrier = tool
        .barriers
        .select(access.shape(), access.kind, AccessOp::Store)
        .unless_null(graph.stamp(value).is_always_null());
    let compressible = access.kind.is_object();
    let converted = implicit_store_convert(graph, tool.config, access.kind, value, compressible);

    let address = field_address(graph, object, access.offset);
    let write = graph.add_node(
        NodeKind::Write {
            kind: access.kind,
            identity: LocationIdentity::Field(field),
            barrier,
            init: false,
        },
        Stamp::Void,
        &[address, converted],
    );
    graph.set_state_after(write, graph.state_after(node));
    graph.replace_fixed_with_fixed(node, write);

    if !access.is_static {
        let guard = create_null_check(graph, tool, object, write);
        graph.set_guard(write, guard);
    }
    if access.is_volatile {
        surround_with_fences(
            graph,
            write,
            MemoryBarriers::JMM_PRE_VOLATILE_WRITE,
            MemoryBarriers::JMM_POST_VOLATILE_WRITE,
        );
    }
    Ok(LowerOutcome::Lowered)
}

// =============================================================================
// Arrays
// =============================================================================

/// Lower an array element load.
pub fn lower_load_indexed(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    element: JavaKind,
) -> CompileResult<LowerOutcome> {
    let array = required_input(graph, node, 0)?;
    let index = required_input(graph, node, 1)?;
    let compressible = element.is_object();
    let stamp = load_stamp(tool.config, element, compressible, graph.stamp(node));

    let address = array_address(graph, tool.config, array, element, index);
    let read = graph.add_node(
        NodeKind::Read {
            kind: element,
            identity: LocationIdentity::ArrayElement(element),
            barrier: BarrierType::None,
        },
        stamp,
        &[address],
    );
    let guard = create_bounds_check(graph, tool, node, array, index);
    graph.set_guard(read, guard);

    let value = implicit_load_convert(graph, tool.config, element, read, compressible);
    graph.replace_all_uses(node, value);
    graph.replace_fixed_with_fixed(node, read);
    Ok(LowerOutcome::Lowered)
}

/// Insert the covariance check an object array store needs.
///
/// Exact array types check against their static component type (nothing
/// to check for `Object[]`); otherwise the element class is loaded from the
/// array's hub and checked dynamically.
fn create_store_check(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    array: NodeId,
    value: NodeId,
    bounds: Option<NodeId>,
) -> NodeId {
    let facts = graph.stamp(array).object_stamp().unwrap_or_default();
    let array_type = facts.ty.filter(|t| graph.meta().ty(*t).is_array);
    if let (Some(array_type), true) = (array_type, facts.exact) {
        let component = graph
            .meta()
            .ty(array_type)
            .component
            .filter(|c| !graph.meta().ty(*c).is_java_lang_object);
        let Some(component) = component else {
            return value;
        };
        let stamp = graph.stamp(value);
        let check = graph.add_node(
            NodeKind::CheckCast {
                ty: component,
                for_store_check: true,
            },
            stamp,
            &[value],
        );
        graph.add_before_fixed(node, check);
        return check;
    }

    let hub = create_read_hub(graph, tool, array, bounds);
    let address = field_address(graph, hub, tool.config.array_class_element_offset);
    let anchor = graph.prev_begin(node).unwrap_or(graph.start());
    let element_klass = graph.add_node(
        NodeKind::FloatingRead {
            kind: JavaKind::Word,
            identity: LocationIdentity::Final,
        },
        Stamp::Word,
        &[address, anchor],
    );
    let stamp = graph.stamp(value);
    let check = graph.add_node(
        NodeKind::CheckCastDynamic {
            for_store_check: true,
        },
        stamp,
        &[element_klass, value],
    );
    graph.add_before_fixed(node, check);
    check
}

/// Lower an array element store.
pub fn lower_store_indexed(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    element: JavaKind,
) -> CompileResult<LowerOutcome> {
    let array = required_input(graph, node, 0)?;
    let index = required_input(graph, node, 1)?;
    let mut value = required_input(graph, node, 2)?;

    let guard = create_bounds_check(graph, tool, node, array, index);
    let value_null = graph.stamp(value).is_always_null();
    if element.is_object() && !value_null {
        value = create_store_check(graph, tool, node, array, value, guard);
    }

    let barrier = tool
        .barriers
        .select(AccessShape::ArrayElement, element, AccessOp::Store)
        .unless_null(value_null);
    let compressible = element.is_object();
    let converted = implicit_store_convert(graph, tool.config, element, value, compressible);

    let address = array_address(graph, tool.config, array, element, index);
    let write = graph.add_guarded(
        NodeKind::Write {
            kind: element,
            identity: LocationIdentity::ArrayElement(element),
            barrier,
            init: false,
        },
        Stamp::Void,
        &[address, converted],
        guard,
    );
    graph.set_state_after(write, graph.state_after(node));
    graph.replace_fixed_with_fixed(node, write);
    Ok(LowerOutcome::Lowered)
}

/// Lower an array length read.
pub fn lower_array_length(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
) -> CompileResult<LowerOutcome> {
    let array = required_input(graph, node, 0)?;
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
    graph.replace_fixed_with_fixed(node, read);
    let guard = create_null_check(graph, tool, array, read);
    graph.set_guard(read, guard);
    Ok(LowerOutcome::Lowered)
}

// =============================================================================
// Atomics
// =============================================================================

/// Lower a compare-and-swap.
pub fn lower_compare_and_swap(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    kind: JavaKind,
    identity: LocationIdentity,
    displacement: i64,
) -> CompileResult<LowerOutcome> {
    let object = required_input(graph, node, 0)?;
    let offset = required_input(graph, node, 1)?;
    let expected = required_input(graph, node, 2)?;
    let new_value = required_input(graph, node, 3)?;

    let barrier = tool
        .barriers
        .select(
            AccessShape::Atomic(receiver_shape(graph, object)),
            kind,
            AccessOp::Store,
        )
        .unless_null(graph.stamp(new_value).is_always_null());
    let compressible = kind.is_object();
    let expected = implicit_store_convert(graph, tool.config, kind, expected, compressible);
    let new_value = implicit_store_convert(graph, tool.config, kind, new_value, compressible);

    let address = create_address(
        graph,
        object,
        AddressParts {
            displacement,
            index: Some(offset),
            scale: 1,
        },
    );
    let cas = graph.add_node(
        NodeKind::LoweredCompareAndSwap {
            kind,
            identity,
            barrier,
        },
        Stamp::Integer {
            bits: 32,
            lower: 0,
            upper: 1,
        },
        &[address, expected, new_value],
    );
    graph.set_state_after(cas, graph.state_after(node));
    graph.replace_fixed_with_fixed(node, cas);
    Ok(LowerOutcome::Lowered)
}

/// Lower an atomic exchange.
pub fn lower_atomic_read_and_write(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    kind: JavaKind,
    identity: LocationIdentity,
) -> CompileResult<LowerOutcome> {
    let object = required_input(graph, node, 0)?;
    let offset = required_input(graph, node, 1)?;
    let new_value = required_input(graph, node, 2)?;

    let barrier = tool
        .barriers
        .select(
            AccessShape::Atomic(receiver_shape(graph, object)),
            kind,
            AccessOp::Store,
        )
        .unless_null(graph.stamp(new_value).is_always_null());
    let compressible = kind.is_object();
    let new_value = implicit_store_convert(graph, tool.config, kind, new_value, compressible);

    let address = create_address(
        graph,
        object,
        AddressParts {
            displacement: 0,
            index: Some(offset),
            scale: 1,
        },
    );
    let stamp = load_stamp(tool.config, kind, compressible, graph.stamp(node));
    let xchg = graph.add_node(
        NodeKind::LoweredAtomicReadAndWrite {
            kind,
            identity,
            barrier,
        },
        stamp,
        &[address, new_value],
    );
    graph.set_state_after(xchg, graph.state_after(node));
    let value = implicit_load_convert(graph, tool.config, kind, xchg, compressible);
    graph.replace_all_uses(node, value);
    graph.replace_fixed_with_fixed(node, xchg);
    Ok(LowerOutcome::Lowered)
}

// =============================================================================
// Unsafe Accesses
// =============================================================================

/// Whether an unsafe load may read `Reference.referent` under G1 and so
/// must go through the barrier-aware template.
pub fn unsafe_load_needs_referent_barrier(
    graph: &Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    kind: JavaKind,
) -> bool {
    if !tool.config.collector.is_concurrent_tracing()
        || !graph.stage().guards_fixed()
        || !kind.is_object()
    {
        return false;
    }
    let Some(object) = graph.input(node, 0) else {
        return false;
    };
    let stamp = graph.stamp(object);
    if stamp.is_always_null() {
        return false;
    }
    match stamp.object_stamp().and_then(|s| s.ty) {
        Some(ty) => !graph.meta().ty(ty).is_array,
        None => false,
    }
}

/// Build the read for an unsafe load and move the load's uses to its value.
fn create_unsafe_read(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    kind: JavaKind,
    identity: LocationIdentity,
    guard: Option<NodeId>,
) -> CompileResult<NodeId> {
    let object = required_input(graph, node, 0)?;
    let offset = required_input(graph, node, 1)?;
    let compressible = kind.is_object() && !graph.stamp(object).is_always_null();
    let parts = decompose_offset(graph, offset);
    let address = create_address(graph, object, parts);
    let stamp = load_stamp(tool.config, kind, compressible, graph.stamp(node));
    let read = graph.add_guarded(
        NodeKind::Read {
            kind,
            identity,
            barrier: BarrierType::None,
        },
        stamp,
        &[address],
        guard,
    );
    let value = implicit_load_convert(graph, tool.config, kind, read, compressible);
    graph.replace_all_uses(node, value);
    Ok(read)
}

/// Lower an unsafe load that does not need the referent template.
///
/// A load with a guarding condition is pinned behind a condition anchor
/// at any stage. Otherwise the load must wait until guards are fixed and
/// is then anchored at the preceding begin.
pub fn lower_unsafe_load(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    kind: JavaKind,
    identity: LocationIdentity,
) -> CompileResult<LowerOutcome> {
    if let Some(condition) = graph.input(node, 2) {
        let anchor = graph.add_node(NodeKind::ConditionAnchor, Stamp::Void, &[condition]);
        let read = create_unsafe_read(graph, tool, node, kind, identity, Some(anchor))?;
        graph.replace_fixed_with_fixed(node, anchor);
        graph.add_after_fixed(anchor, read);
        return Ok(LowerOutcome::Lowered);
    }
    if graph.stage().guards_floating() {
        return Ok(LowerOutcome::Deferred);
    }
    let begin = graph.prev_begin(node);
    let read = create_unsafe_read(graph, tool, node, kind, identity, begin)?;
    graph.replace_fixed_with_fixed(node, read);
    Ok(LowerOutcome::Lowered)
}

/// Lower an unsafe store.
pub fn lower_unsafe_store(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    kind: JavaKind,
    identity: LocationIdentity,
) -> CompileResult<LowerOutcome> {
    let object = required_input(graph, node, 0)?;
    let offset = required_input(graph, node, 1)?;
    let value = required_input(graph, node, 2)?;

    let value_kind = graph.stamp(value).java_kind();
    let compressible = value_kind.is_object();
    let barrier = tool
        .barriers
        .select(
            AccessShape::Unsafe(receiver_shape(graph, object)),
            value_kind,
            AccessOp::Store,
        )
        .unless_null(graph.stamp(value).is_always_null());
    let converted = implicit_store_convert(graph, tool.config, kind, value, compressible);

    let parts = decompose_offset(graph, offset);
    let address = create_address(graph, object, parts);
    let write = graph.add_node(
        NodeKind::Write {
            kind,
            identity,
            barrier,
            init: false,
        },
        Stamp::Void,
        &[address, converted],
    );
    graph.set_state_after(write, graph.state_after(node));
    graph.replace_fixed_with_fixed(node, write);
    Ok(LowerOutcome::Lowered)
}

// =============================================================================
// Pre-resolved Accesses
// =============================================================================

/// Lower a read whose location and barrier were chosen by an earlier phase.
pub fn lower_java_read(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
) -> CompileResult<LowerOutcome> {
    let NodeKind::JavaRead {
        kind,
        identity,
        displacement,
        barrier,
        compressible,
    } = graph.kind(node)
    else {
        return Ok(LowerOutcome::Unchanged);
    };
    let object = required_input(graph, node, 0)?;
    let address = create_address(graph, object, AddressParts::displacement(displacement));
    let stamp = load_stamp(tool.config, kind, compressible, graph.stamp(node));
    let read = graph.add_guarded(
        NodeKind::Read {
            kind,
            identity,
            barrier,
        },
        stamp,
        &[address],
        graph.guard(node),
    );
    let value = implicit_load_convert(graph, tool.config, kind, read, compressible);
    graph.replace_all_uses(node, value);
    graph.replace_fixed_with_fixed(node, read);
    Ok(LowerOutcome::Lowered)
}

/// Lower a write whose location and barrier were chosen by an earlier phase.
pub fn lower_java_write(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
) -> CompileResult<LowerOutcome> {
    let NodeKind::JavaWrite {
        kind,
        identity,
        displacement,
        barrier,
        compressible,
        init,
    } = graph.kind(node)
    else {
        return Ok(LowerOutcome::Unchanged);
    };
    let object = required_input(graph, node, 0)?;
    let value = required_input(graph, node, 1)?;
    let converted = implicit_store_convert(graph, tool.config, kind, value, compressible);
    let address = create_address(graph, object, AddressParts::displacement(displacement));
    let write = graph.add_guarded(
        NodeKind::Write {
            kind,
            identity,
            barrier,
            init,
        },
        Stamp::Void,
        &[address, converted],
        graph.guard(node),
    );
    graph.set_state_after(write, graph.state_after(node));
    graph.replace_fixed_with_fixed(node, write);
    Ok(LowerOutcome::Lowered)
}

// =============================================================================
// Headers and Dispatch Tables
// =============================================================================

/// Lower a hub load. Waits until guards are fixed so the read can use
/// the load's guard directly.
pub fn lower_load_hub(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
) -> CompileResult<LowerOutcome> {
    if graph.stage().guards_floating() {
        return Ok(LowerOutcome::Deferred);
    }
    let object = required_input(graph, node, 0)?;
    let hub = create_read_hub(graph, tool, object, graph.guard(node));
    graph.replace_floating(node, hub);
    Ok(LowerOutcome::Lowered)
}

/// Lower a hub store.
pub fn lower_store_hub(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
) -> CompileResult<LowerOutcome> {
    let object = required_input(graph, node, 0)?;
    let hub = required_input(graph, node, 1)?;
    let value = compress_klass(graph, tool.config, hub);
    let address = field_address(graph, object, tool.config.hub_offset);
    let write = graph.add_node(
        NodeKind::Write {
            kind: JavaKind::Word,
            identity: LocationIdentity::Hub,
            barrier: BarrierType::None,
            init: false,
        },
        Stamp::Void,
        &[address, value],
    );
    graph.set_state_after(write, graph.state_after(node));
    graph.replace_fixed_with_fixed(node, write);
    Ok(LowerOutcome::Lowered)
}

/// Lower a dispatch-table method load.
pub fn lower_load_method(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    method: MethodRef,
) -> CompileResult<LowerOutcome> {
    let hub = required_input(graph, node, 0)?;
    let read = create_read_virtual_method(graph, tool, hub, method)?;
    graph.replace_fixed_with_fixed(node, read);
    Ok(LowerOutcome::Lowered)
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
