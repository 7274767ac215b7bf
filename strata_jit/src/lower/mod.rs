//! Graph lowering.
//!
//! Rewrites high-level nodes into explicit memory operations, guards and
//! runtime calls, then inserts the collector's barriers:
//!
//! - [`provider`]: per-node dispatch ([`HotSpotLoweringProvider`])
//! - [`phase`]: worklist driver running the provider to a fixed point
//! - [`barriers`]: write barrier addition after lowering
//! - [`address`], [`convert`], [`guards`]: shared building blocks
//! - [`memory`], [`invoke`], [`osr`], [`commit`], [`exception`]: handlers
//! - [`templates`]: template families for VM-supplied subgraphs
//!
//! # Pipeline
//!
//! ```text
//! GuardsFloating      -> LoweringPhase   (fields, arrays, invokes, exceptions)
//! GuardsFixed         -> LoweringPhase   (OSR entry, hubs, unsafe loads, type checks)
//! FrameStatesAssigned -> LoweringPhase   (allocation, commits, monitors)
//!                     -> WriteBarrierAddition
//!                     -> LoweringPhase   (barrier templates)
//! ```

pub mod address;
pub mod barriers;
pub mod commit;
pub mod convert;
pub mod exception;
pub mod guards;
pub mod invoke;
pub mod memory;
pub mod osr;
pub mod phase;
pub mod provider;
pub mod stage;
pub mod templates;
pub mod tool;
pub mod worklist;

pub use address::AddressParts;
pub use barriers::WriteBarrierAddition;
pub use phase::{LoweringPhase, LoweringStats, Phase};
pub use provider::HotSpotLoweringProvider;
pub use stage::LoweringStage;
pub use templates::{RuntimeCallTemplates, Templates};
pub use tool::LoweringTool;
pub use worklist::Worklist;

/// Result of offering one node to a lowering handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LowerOutcome {
    /// The node was replaced and deleted.
    Lowered,
    /// The graph has not reached the stage this node needs.
    Deferred,
    /// The node is deliberately left as is.
    Unchanged,
}

impl LowerOutcome {
    /// Whether the graph was modified.
    #[inline]
    pub const fn changed(self) -> bool {
        matches!(self, LowerOutcome::Lowered)
    }
}
