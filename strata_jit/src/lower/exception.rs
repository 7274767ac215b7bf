//! Implicit exception construction.

use strata_core::{CompileResult, JavaKind};
use tracing::debug;

use super::tool::LoweringTool;
use super::LowerOutcome;
use crate::ir::{
    BytecodeExceptionKind, ForeignCallDescriptor, Graph, NodeId, NodeKind, ObjectStamp, Stamp,
};

fn runtime_entry(exception: BytecodeExceptionKind) -> ForeignCallDescriptor {
    match exception {
        BytecodeExceptionKind::NullPointer => ForeignCallDescriptor::CreateNullPointerException,
        BytecodeExceptionKind::OutOfBounds => ForeignCallDescriptor::CreateOutOfBoundsException,
    }
}

/// Materialize the exception object thrown by a failing bytecode check.
///
/// Hot exceptions may reuse a preallocated instance without a stack trace.
/// Only runs while guards float; later stages keep the node as is.
pub fn lower_bytecode_exception(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
    exception: BytecodeExceptionKind,
) -> CompileResult<LowerOutcome> {
    if !graph.stage().guards_floating() {
        return Ok(LowerOutcome::Unchanged);
    }

    if tool.options.omit_hot_exception_stacktrace {
        let cached = match exception {
            BytecodeExceptionKind::NullPointer => tool.config.cached_null_pointer_exception,
            BytecodeExceptionKind::OutOfBounds => tool.config.cached_out_of_bounds_exception,
        };
        let stamp = graph
            .stamp(node)
            .object_stamp()
            .unwrap_or_else(ObjectStamp::unknown);
        let constant = graph.const_object(cached, stamp);
        graph.replace_fixed_with_floating(node, constant);
        debug!(%node, ?exception, "cached exception");
        return Ok(LowerOutcome::Lowered);
    }

    let args = graph.inputs(node).to_vec();
    let stamp = match graph.stamp(node) {
        Stamp::Object(object) => Stamp::Object(object.as_non_null()),
        _ => Stamp::for_kind(JavaKind::Object),
    };
    let call = graph.add_node(NodeKind::ForeignCall(runtime_entry(exception)), stamp, &args);
    graph.set_state_after(call, graph.state_after(node));
    graph.replace_fixed_with_fixed(node, call);
    debug!(%node, %call, ?exception, "exception via runtime call");
    Ok(LowerOutcome::Lowered)
}
