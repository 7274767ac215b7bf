//! Lowering stages.
//!
//! A graph moves through three stages. Each handler checks the stage it
//! needs and defers otherwise, so the same graph can be offered to the
//! dispatcher repeatedly as compilation advances.

use std::fmt;

use strata_core::{CompileError, CompileResult};

/// How far a graph has progressed through compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum LoweringStage {
    /// Guards are floating nodes anchored at a begin.
    #[default]
    GuardsFloating = 0,
    /// Guards have been pinned into the control flow.
    GuardsFixed = 1,
    /// Every side effect carries its final frame state.
    FrameStatesAssigned = 2,
}

impl LoweringStage {
    /// Get a human-readable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            LoweringStage::GuardsFloating => "GuardsFloating",
            LoweringStage::GuardsFixed => "GuardsFixed",
            LoweringStage::FrameStatesAssigned => "FrameStatesAssigned",
        }
    }

    /// Whether guards are still floating.
    #[inline]
    pub const fn guards_floating(self) -> bool {
        matches!(self, LoweringStage::GuardsFloating)
    }

    /// Whether guards have been fixed.
    #[inline]
    pub const fn guards_fixed(self) -> bool {
        !self.guards_floating()
    }

    /// Whether frame states have been assigned.
    #[inline]
    pub const fn frame_states_assigned(self) -> bool {
        matches!(self, LoweringStage::FrameStatesAssigned)
    }

    /// Whether this stage is at least `required`.
    #[inline]
    pub fn satisfies(self, required: LoweringStage) -> bool {
        self >= required
    }

    /// Validate a transition to `to`. Stages never move backwards.
    pub fn check_advance(self, to: LoweringStage) -> CompileResult<()> {
        if to < self {
            return Err(CompileError::stage_regression(self.as_str(), to.as_str()));
        }
        Ok(())
    }
}

impl fmt::Display for LoweringStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
