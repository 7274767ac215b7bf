//! Deoptimization metadata.
//!
//! A failing guard transfers execution back to the interpreter. The pair
//! of [`DeoptReason`] and [`DeoptAction`] attached to the guard tells the
//! runtime why it happened and what to do with the compiled code
//! afterwards. The pairs are stable per guard kind: a null check always
//! carries [`DeoptReason::NullCheckException`], a bounds check always
//! carries [`DeoptReason::BoundsCheckException`].

use std::fmt;

// =============================================================================
// Deoptimization Reason
// =============================================================================

/// Why a guard failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeoptReason {
    /// No specific reason.
    None = 0,
    /// Receiver or base object was null.
    NullCheckException = 1,
    /// Array index out of range.
    BoundsCheckException = 2,
    /// Checked cast failed.
    ClassCastException = 3,
    /// Array store check failed.
    ArrayStoreException = 4,
    /// Speculated type was wrong.
    TypeCheckedInliningViolated = 5,
    /// Code believed unreachable was reached.
    UnreachedCode = 6,
    /// Transfer to interpreter requested explicitly.
    TransferToInterpreter = 7,
}

impl DeoptReason {
    /// Get a human-readable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            DeoptReason::None => "None",
            DeoptReason::NullCheckException => "NullCheckException",
            DeoptReason::BoundsCheckException => "BoundsCheckException",
            DeoptReason::ClassCastException => "ClassCastException",
            DeoptReason::ArrayStoreException => "ArrayStoreException",
            DeoptReason::TypeCheckedInliningViolated => "TypeCheckedInliningViolated",
            DeoptReason::UnreachedCode => "UnreachedCode",
            DeoptReason::TransferToInterpreter => "TransferToInterpreter",
        }
    }
}

impl fmt::Display for DeoptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Deoptimization Action
// =============================================================================

/// What the runtime does with the compiled code after a guard fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DeoptAction {
    /// Keep the code, just resume in the interpreter.
    None = 0,
    /// Recompile only if this keeps happening.
    RecompileIfTooManyDeopts = 1,
    /// Invalidate, gather fresh profile, then recompile.
    InvalidateReprofile = 2,
    /// Invalidate and recompile immediately.
    InvalidateRecompile = 3,
    /// Invalidate and never compile this method again.
    InvalidateStopCompiling = 4,
}

impl DeoptAction {
    /// Get a human-readable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            DeoptAction::None => "None",
            DeoptAction::RecompileIfTooManyDeopts => "RecompileIfTooManyDeopts",
            DeoptAction::InvalidateReprofile => "InvalidateReprofile",
            DeoptAction::InvalidateRecompile => "InvalidateRecompile",
            DeoptAction::InvalidateStopCompiling => "InvalidateStopCompiling",
        }
    }

    /// Whether taking the deopt throws away the installed code.
    pub const fn invalidates(self) -> bool {
        matches!(
            self,
            DeoptAction::InvalidateReprofile
                | DeoptAction::InvalidateRecompile
                | DeoptAction::InvalidateStopCompiling
        )
    }
}

impl fmt::Display for DeoptAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Guard Kind
// =============================================================================

/// The implicit-exception guards synthesized by lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardKind {
    /// Object must be non-null.
    NullCheck,
    /// Index must be within `[0, length)`.
    BoundsCheck,
}

impl GuardKind {
    /// The fixed reason/action pair for this guard kind.
    pub const fn deopt(self) -> (DeoptReason, DeoptAction) {
        match self {
            GuardKind::NullCheck => (
                DeoptReason::NullCheckException,
                DeoptAction::InvalidateReprofile,
            ),
            GuardKind::BoundsCheck => (
                DeoptReason::BoundsCheckException,
                DeoptAction::InvalidateReprofile,
            ),
        }
    }
}
