//! On-stack-replacement entry.
//!
//! An OSR graph is entered with a pointer to a buffer holding the
//! interpreter frame's locals. The entry is rewritten into an ordinary
//! start followed by loads from that buffer and a runtime call that frees
//! it:
//!
//! ```text
//! Start -> Read(buf + off(0)) -> ... -> ForeignCall(OSR_migration_end, buf) -> ...
//! ```
//!
//! Local `i` of `w` slots lives at
//! `(max_locals - 1) * word - (i + w - 1) * word` from the buffer start.

use strata_core::{CompileError, CompileResult, JavaKind};
use strata_gc::BarrierType;
use tracing::debug;

use super::address::{create_address, AddressParts};
use super::tool::LoweringTool;
use super::LowerOutcome;
use crate::ir::{ForeignCallDescriptor, Graph, LocationIdentity, NodeId, NodeKind, Stamp};

/// Byte offset of local `index` of `kind` in the OSR buffer.
pub fn osr_local_offset(max_locals: u32, word_size: u32, index: u32, kind: JavaKind) -> i64 {
    let word = word_size as i64;
    let locals_offset = (max_locals as i64 - 1) * word;
    let slots = kind.stack_slots().max(1) as i64;
    locals_offset - (index as i64 + slots - 1) * word
}

/// Rewrite an OSR start. Requires guards to be fixed.
pub fn lower_osr_start(
    graph: &mut Graph,
    tool: &LoweringTool<'_>,
    node: NodeId,
) -> CompileResult<LowerOutcome> {
    if graph.stage().guards_floating() {
        return Ok(LowerOutcome::Deferred);
    }
    if graph.start() != node {
        return Err(CompileError::invalid_graph(format!(
            "OSR start {node} is not the graph entry"
        )));
    }

    let start = graph.add_node(NodeKind::Start, Stamp::Void, &[]);
    let buffer = graph.unique(NodeKind::Parameter(0), Stamp::Word, &[]);
    let migration_end = graph.add_node(
        NodeKind::ForeignCall(ForeignCallDescriptor::OsrMigrationEnd),
        Stamp::Void,
        &[buffer],
    );
    graph.set_state_after(migration_end, graph.state_after(node));

    let successor = graph.next(node);
    graph.set_next(node, None);
    graph.set_next(start, Some(migration_end));
    graph.set_next(migration_end, successor);
    graph.set_start(start);

    let max_locals = graph.method().max_locals;
    let locals: Vec<(NodeId, u32, JavaKind)> = graph
        .iter()
        .filter_map(|(id, n)| match n.kind {
            NodeKind::OsrLocal { index, kind } => Some((id, index, kind)),
            _ => None,
        })
        .collect();
    for (local, index, kind) in locals {
        let offset = osr_local_offset(max_locals, tool.config.word_size, index, kind);
        let address = create_address(graph, buffer, AddressParts::displacement(offset));
        let stamp = graph.stamp(local);
        let read = graph.add_node(
            NodeKind::Read {
                kind,
                identity: LocationIdentity::Any,
                barrier: BarrierType::None,
            },
            stamp,
            &[address],
        );
        graph.replace_floating(local, read);
        graph.add_before_fixed(migration_end, read);
        debug!(%read, index, offset, "OSR local");
    }

    graph.replace_all_uses(node, start);
    graph.kill(node);
    Ok(LowerOutcome::Lowered)
}
