//! Graph phases and the lowering driver.

use strata_core::CompileResult;
use tracing::debug;

use super::provider::HotSpotLoweringProvider;
use super::worklist::Worklist;
use super::LowerOutcome;
use crate::ir::{Graph, NodeId};

// =============================================================================
// Phase Trait
// =============================================================================

/// A whole-graph transformation.
pub trait Phase {
    /// The name of this phase (for logging).
    fn name(&self) -> &'static str;

    /// Run the phase on the graph.
    /// Returns true if the graph was modified.
    fn run(&mut self, graph: &mut Graph) -> CompileResult<bool>;
}

// =============================================================================
// Lowering Phase
// =============================================================================

/// Counters from the last lowering run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoweringStats {
    /// Nodes replaced.
    pub lowered: usize,
    /// Nodes waiting for a later stage.
    pub deferred: usize,
    /// Nodes deliberately left alone.
    pub unchanged: usize,
}

/// Offers every lowerable node to the provider until nothing is left.
///
/// The set of nodes is snapshotted before any rewrite. Nodes created by a
/// rewrite that are themselves lowerable join the same run; deferred nodes
/// are not retried until the phase runs again.
#[derive(Debug, Clone)]
pub struct LoweringPhase {
    provider: HotSpotLoweringProvider,
    stats: LoweringStats,
}

impl LoweringPhase {
    /// Create a lowering phase over a provider.
    pub fn new(provider: HotSpotLoweringProvider) -> Self {
        Self {
            provider,
            stats: LoweringStats::default(),
        }
    }

    /// The provider this phase dispatches to.
    pub fn provider(&self) -> &HotSpotLoweringProvider {
        &self.provider
    }

    /// Counters from the last run.
    pub fn stats(&self) -> LoweringStats {
        self.stats
    }

    fn lowerable_from(graph: &Graph, first: u32) -> Vec<NodeId> {
        (first..graph.id_bound())
            .map(NodeId::new)
            .filter(|&id| graph.is_alive(id) && graph.kind(id).is_lowerable())
            .collect()
    }
}

impl Phase for LoweringPhase {
    fn name(&self) -> &'static str {
        "Lowering"
    }

    fn run(&mut self, graph: &mut Graph) -> CompileResult<bool> {
        self.stats = LoweringStats::default();

        let snapshot = Self::lowerable_from(graph, 0);
        let mut worklist = Worklist::with_capacity(snapshot.len());
        worklist.push_all(snapshot);
        let mut bound = graph.id_bound();

        while let Some(node) = worklist.pop() {
            if !graph.is_alive(node) || !graph.kind(node).is_lowerable() {
                continue;
            }
            match self.provider.lower(graph, node)? {
                LowerOutcome::Lowered => self.stats.lowered += 1,
                LowerOutcome::Deferred => self.stats.deferred += 1,
                LowerOutcome::Unchanged => self.stats.unchanged += 1,
            }
            if graph.id_bound() > bound {
                worklist.push_all(Self::lowerable_from(graph, bound));
                bound = graph.id_bound();
            }
        }

        debug!(
            stage = %graph.stage(),
            lowered = self.stats.lowered,
            deferred = self.stats.deferred,
            unchanged = self.stats.unchanged,
            processed = worklist.total_processed(),
            "lowering round"
        );
        Ok(self.stats.lowered > 0)
    }
}
