//! Virtual call resolution.
//!
//! A virtual call site is either expanded inline into a dispatch-table
//! lookup or left as an opaque call resolved by the runtime:
//!
//! ```text
//! hub    = FloatingRead(receiver + hub_offset)        guarded by null check
//! method = Read(hub + vtable_entry_offset(slot))      Any
//! entry  = Read(method + compiled_entry_offset)       Any
//! call   = IndirectCallTarget(method, entry, args...)
//! ```

use strata_core::{CompileError, CompileResult, JavaKind};
use strata_gc::BarrierType;
use tracing::debug;

use super::address::field_address;
use super::guards::create_null_check;
use super::memory::{create_read_hub, create_read_virtual_method, qualified_name};
use super::tool::LoweringTool;
use super::LowerOutcome;
use crate::ir::{Graph, InvokeKind, LocationIdentity, MethodRef, NodeId, NodeKind, Stamp};

/// Whether the options ask for inline expansion at this site.
pub fn wants_inline_dispatch(tool: &LoweringTool<'_>, invoke: InvokeKind, polymorphic: bool) -> bool {
    invoke == InvokeKind::Virtual
        && tool.options.inline_vtable_stubs
        && (tool.options.always_inline_vtable_stubs || polymorphic)
}

/// Lower the call target of an invoke.
///
/// Invokes whose target was already lowered are left alone.
pub fn lower_invoke(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    polymorphic: bool,
) -> CompileResult<LowerOutcome> {
    let Some(target) = graph.input(node, 0) else {
        return Err(CompileError::invalid_graph(format!("{node} has no call target")));
    };
    let NodeKind::MethodCallTarget { method, invoke } = graph.kind(target) else {
        return Ok(LowerOutcome::Unchanged);
    };
    let args: Vec<NodeId> = graph.inputs(target).to_vec();

    let receiver_check = match (invoke.has_receiver(), args.first()) {
        (true, Some(&receiver)) if graph.stamp(receiver).object_stamp().is_some() => {
            let guard = create_null_check(graph, tool, receiver, node);
            graph.set_guard(node, guard);
            guard
        }
        _ => None,
    };

    let lowered = if wants_inline_dispatch(tool, invoke, polymorphic) {
        expand_dispatch(graph, tool, node, method, &args, receiver_check)?
    } else {
        debug!(%node, method = %qualified_name(graph, method), "direct call target");
        graph.add_node(
            NodeKind::DirectCallTarget { method, invoke },
            Stamp::Void,
            &args,
        )
    };

    graph.replace_floating(target, lowered);
    Ok(LowerOutcome::Lowered)
}

fn expand_dispatch(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    method: MethodRef,
    args: &[NodeId],
    receiver_check: Option<NodeId>,
) -> CompileResult<NodeId> {
    let resolved = graph.meta().method(method);
    if graph.meta().ty(resolved.holder).is_interface || resolved.vtable_index.is_none() {
        return Err(CompileError::missing_vtable_slot(qualified_name(graph, method)));
    }
    let Some(&receiver) = args.first() else {
        return Err(CompileError::invalid_graph(format!(
            "virtual call {node} has no receiver"
        )));
    };

    let hub = create_read_hub(graph, tool, receiver, receiver_check);
    let method_ptr = create_read_virtual_method(graph, tool, hub, method)?;
    let address = field_address(graph, method_ptr, tool.config.method_compiled_entry_offset);
    let entry = graph.add_node(
        NodeKind::Read {
            kind: JavaKind::Word,
            identity: LocationIdentity::Any,
            barrier: BarrierType::None,
        },
        Stamp::Word,
        &[address],
    );
    graph.add_before_fixed(node, method_ptr);
    graph.add_after_fixed(method_ptr, entry);

    let mut inputs = Vec::with_capacity(args.len() + 2);
    inputs.push(method_ptr);
    inputs.push(entry);
    inputs.extend_from_slice(args);
    debug!(%node, method = %qualified_name(graph, method), "inline dispatch");
    Ok(graph.add_node(
        NodeKind::IndirectCallTarget { method },
        Stamp::Void,
        &inputs,
    ))
}
