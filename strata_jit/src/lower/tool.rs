//! Shared context handed to every lowering handler.

use strata_core::{DeoptAction, DeoptReason};
use strata_gc::BarrierSet;
use tracing::trace;

use crate::config::{LoweringOptions, VmConfig};
use crate::ir::{Graph, NodeId, NodeKind, Stamp};

/// Per-call lowering context: VM layout, options and barrier rules.
#[derive(Debug, Clone, Copy)]
pub struct LoweringTool<'a> {
    /// VM layout snapshot.
    pub config: &'a VmConfig,
    /// Compiler options.
    pub options: &'a LoweringOptions,
    /// Barrier rules of the configured collector.
    pub barriers: BarrierSet,
}

impl<'a> LoweringTool<'a> {
    /// Create a tool over a configuration snapshot.
    pub fn new(config: &'a VmConfig, options: &'a LoweringOptions) -> Self {
        Self {
            config,
            options,
            barriers: config.barrier_set(),
        }
    }

    /// Create a guard that deoptimizes unless `condition` holds
    /// (or unless it fails, when `negated`).
    ///
    /// While guards float the guard is value numbered and anchored at the
    /// begin dominating `before`. Once guards are fixed it is inserted into
    /// the control flow directly before `before`.
    pub fn create_guard(
        &self,
        graph: &mut Graph,
        before: NodeId,
        condition: NodeId,
        reason: DeoptReason,
        action: DeoptAction,
        negated: bool,
    ) -> NodeId {
        if graph.stage().guards_floating() {
            let anchor = graph.prev_begin(before).unwrap_or(graph.start());
            let guard = graph.unique(
                NodeKind::Guard {
                    reason,
                    action,
                    negated,
                },
                Stamp::Void,
                &[condition, anchor],
            );
            trace!(%guard, %anchor, reason = reason.as_str(), "floating guard");
            guard
        } else {
            let guard = graph.add_node(
                NodeKind::FixedGuard {
                    reason,
                    action,
                    negated,
                },
                Stamp::Void,
                &[condition],
            );
            graph.add_before_fixed(before, guard);
            trace!(%guard, %before, reason = reason.as_str(), "fixed guard");
            guard
        }
    }
}
