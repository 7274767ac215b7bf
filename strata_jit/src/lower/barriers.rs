//! Write barrier addition.
//!
//! Runs after lowering, over the low-level memory operations that carry a
//! barrier descriptor. Each descriptor is expanded into the active
//! collector's barrier operations, placed before or after the access:
//!
//! | collector     | write                                        | referent read      |
//! |---------------|----------------------------------------------|--------------------|
//! | serial, par.  | card mark after                              | none               |
//! | G1            | SATB pre before (not on init), post after    | SATB log after     |
//! | Epsilon       | none                                         | none               |
//!
//! The inserted `WriteBarrier` nodes are themselves lowered by the
//! write-barrier template family.

use std::sync::Arc;

use strata_core::CompileResult;
use strata_gc::{BarrierOp, BarrierPlacement, BarrierSet, BarrierType};
use tracing::debug;

use super::address::clone_address;
use super::phase::Phase;
use crate::config::VmConfig;
use crate::ir::{CompressTarget, Graph, GraphFlags, NodeId, NodeKind, Stamp};

/// A memory operation that needs barriers, with its value operand.
#[derive(Debug, Clone, Copy)]
struct BarrierSite {
    node: NodeId,
    barrier: BarrierType,
    init: bool,
    value: Option<NodeId>,
    is_read: bool,
}

fn barrier_site(graph: &Graph, node: NodeId) -> Option<BarrierSite> {
    let (barrier, init, value_index, is_read) = match graph.kind(node) {
        NodeKind::Write { barrier, init, .. } => (barrier, init, Some(1), false),
        NodeKind::LoweredCompareAndSwap { barrier, .. } => (barrier, false, Some(2), false),
        NodeKind::LoweredAtomicReadAndWrite { barrier, .. } => (barrier, false, Some(1), false),
        NodeKind::Read { barrier, .. } => (barrier, false, None, true),
        _ => return None,
    };
    if !barrier.is_some() {
        return None;
    }
    Some(BarrierSite {
        node,
        barrier,
        init,
        value: value_index.and_then(|i| graph.input(node, i)),
        is_read,
    })
}

/// The uncompressed form of a stored value.
fn full_width_value(graph: &Graph, value: NodeId) -> NodeId {
    match graph.kind(value) {
        NodeKind::Compress { .. } => graph.input(value, 0).unwrap_or(value),
        _ => value,
    }
}

/// The decoded form of a reference just read, or the read itself when the
/// heap is not compressed.
fn full_width_read(graph: &Graph, read: NodeId) -> NodeId {
    graph
        .uses(read)
        .into_iter()
        .find(|&user| {
            matches!(
                graph.kind(user),
                NodeKind::Uncompress {
                    target: CompressTarget::Oop,
                    ..
                }
            )
        })
        .unwrap_or(read)
}

/// Inserts collector barriers around barriered memory operations.
#[derive(Debug)]
pub struct WriteBarrierAddition {
    barriers: BarrierSet,
    added: usize,
}

impl WriteBarrierAddition {
    /// Create the pass for a VM configuration.
    pub fn new(config: Arc<VmConfig>) -> Self {
        Self {
            barriers: config.barrier_set(),
            added: 0,
        }
    }

    /// Barrier nodes inserted by the last run.
    pub fn added(&self) -> usize {
        self.added
    }

    fn insert(&mut self, graph: &mut Graph, site: BarrierSite, op: BarrierOp) {
        let Some(address) = graph.input(site.node, 0) else {
            return;
        };
        let target = match op {
            BarrierOp::SerialCardMark { precise: false } | BarrierOp::G1Post { precise: false } => {
                graph.input(address, 0)
            }
            _ => clone_address(graph, address),
        };
        let Some(target) = target else {
            return;
        };

        let mut inputs = vec![target];
        match op {
            BarrierOp::G1Post { .. } => {
                if let Some(value) = site.value {
                    inputs.push(full_width_value(graph, value));
                }
            }
            BarrierOp::G1ReferentRead => inputs.push(full_width_read(graph, site.node)),
            _ => {}
        }

        let barrier = graph.add_node(NodeKind::WriteBarrier(op), Stamp::Void, &inputs);
        match op.placement() {
            BarrierPlacement::Before => graph.add_before_fixed(site.node, barrier),
            BarrierPlacement::After => graph.add_after_fixed(site.node, barrier),
        }
        self.added += 1;
    }
}

impl Phase for WriteBarrierAddition {
    fn name(&self) -> &'static str {
        "WriteBarrierAddition"
    }

    fn run(&mut self, graph: &mut Graph) -> CompileResult<bool> {
        self.added = 0;
        if graph.flags().contains(GraphFlags::BARRIERS_ADDED) {
            return Ok(false);
        }

        let sites: Vec<BarrierSite> = graph
            .node_ids()
            .into_iter()
            .filter_map(|id| barrier_site(graph, id))
            .collect();
        for site in sites {
            let ops = if site.is_read {
                self.barriers.read_barriers(site.barrier)
            } else {
                self.barriers.write_barriers(site.barrier, site.init)
            };
            // A post barrier goes right after the access, so insert in reverse
            // to keep the expansion order.
            for op in ops.into_iter().rev() {
                self.insert(graph, site, op);
            }
        }

        graph.insert_flags(GraphFlags::BARRIERS_ADDED);
        debug!(added = self.added, collector = ?self.barriers.collector, "write barriers");
        Ok(self.added > 0)
    }
}
