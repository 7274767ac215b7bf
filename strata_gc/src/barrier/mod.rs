//! Barrier selection for compiled memory accesses.
//!
//! Every reference store must tell the collector about the new edge so a
//! minor collection does not have to scan the whole old generation. The
//! compiler records *what kind* of barrier a store needs as a
//! [`BarrierType`] on the memory node; a later pass expands that
//! descriptor into collector-specific barrier operations (see
//! [`expand`]).
//!
//! # Precision
//!
//! - **Precise**: the barrier is told the exact slot address (array
//!   elements, unknown receivers).
//! - **Imprecise**: marking the object header is enough, because the
//!   collector rescans the whole instance (fields of non-array objects).

pub mod expand;

#[cfg(test)]
mod selection_tests;

pub use expand::{BarrierOp, BarrierPlacement};

use crate::collector::CollectorKind;
use strata_core::JavaKind;

// =============================================================================
// Barrier Type
// =============================================================================

/// The barrier descriptor carried by a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BarrierType {
    /// No barrier.
    #[default]
    None,
    /// Barrier on the exact slot address.
    Precise,
    /// Barrier on the containing object.
    Imprecise,
}

impl BarrierType {
    /// Whether any barrier is required.
    #[inline]
    pub const fn is_some(self) -> bool {
        !matches!(self, BarrierType::None)
    }

    /// Whether the barrier must cover the exact slot.
    #[inline]
    pub const fn is_precise(self) -> bool {
        matches!(self, BarrierType::Precise)
    }

    /// Drop the barrier when the stored value is statically null.
    #[inline]
    pub const fn unless_null(self, value_always_null: bool) -> BarrierType {
        if value_always_null {
            BarrierType::None
        } else {
            self
        }
    }
}

// =============================================================================
// Access Shape
// =============================================================================

/// What is statically known about the object an atomic or unsafe access targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverShape {
    /// Statically known to be a non-array instance.
    Instance,
    /// An array, or nothing is known.
    ArrayOrUnknown,
}

impl ReceiverShape {
    /// Classify from an optional "is array" fact.
    ///
    /// `None` means the type is unknown, which must be treated like an array.
    #[inline]
    pub const fn from_type(is_array: Option<bool>) -> Self {
        match is_array {
            Some(false) => ReceiverShape::Instance,
            _ => ReceiverShape::ArrayOrUnknown,
        }
    }

    #[inline]
    const fn barrier(self) -> BarrierType {
        match self {
            ReceiverShape::Instance => BarrierType::Imprecise,
            ReceiverShape::ArrayOrUnknown => BarrierType::Precise,
        }
    }
}

/// The shape of a memory access as far as barrier selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessShape {
    /// Instance or static field; `referent` marks `Reference.referent`.
    Field {
        /// The field is the referent of a `java.lang.ref.Reference`.
        referent: bool,
    },
    /// Array element.
    ArrayElement,
    /// Compare-and-swap or atomic read-and-write.
    Atomic(ReceiverShape),
    /// Raw offset access through the unsafe API.
    Unsafe(ReceiverShape),
    /// Initializing store into a freshly allocated object.
    Init {
        /// The target is an array.
        array: bool,
    },
}

/// Whether an access reads or writes memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessOp {
    /// Memory read.
    Load,
    /// Memory write (including atomics).
    Store,
}

// =============================================================================
// Barrier Set
// =============================================================================

/// The collector's barrier requirements, as configured for one VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BarrierSet {
    /// The active collector.
    pub collector: CollectorKind,
    /// Initializing stores into new objects need no barrier because the
    /// VM defers the card marks to the allocation slow path.
    pub deferred_init_barriers: bool,
}

impl BarrierSet {
    /// Create a barrier set for a collector.
    pub const fn new(collector: CollectorKind) -> Self {
        Self {
            collector,
            deferred_init_barriers: false,
        }
    }

    /// Enable or disable deferred initializing barriers.
    pub const fn with_deferred_init_barriers(mut self, deferred: bool) -> Self {
        self.deferred_init_barriers = deferred;
        self
    }

    /// Choose the barrier for an access.
    pub fn select(&self, shape: AccessShape, value_kind: JavaKind, op: AccessOp) -> BarrierType {
        if !value_kind.is_object() {
            return BarrierType::None;
        }
        match op {
            AccessOp::Load => match shape {
                AccessShape::Field { referent: true } if self.collector.is_concurrent_tracing() => {
                    BarrierType::Precise
                }
                _ => BarrierType::None,
            },
            AccessOp::Store => {
                if !self.collector.needs_write_barrier() {
                    return BarrierType::None;
                }
                match shape {
                    AccessShape::Field { .. } => BarrierType::Imprecise,
                    AccessShape::ArrayElement => BarrierType::Precise,
                    AccessShape::Atomic(receiver) | AccessShape::Unsafe(receiver) => {
                        receiver.barrier()
                    }
                    AccessShape::Init { .. } if self.deferred_init_barriers => BarrierType::None,
                    AccessShape::Init { array: false } => BarrierType::Imprecise,
                    AccessShape::Init { array: true } => BarrierType::Precise,
                }
            }
        }
    }
}

/// Choose the barrier for an access under `collector` with default VM flags.
pub fn select(
    shape: AccessShape,
    value_kind: JavaKind,
    op: AccessOp,
    collector: CollectorKind,
) -> BarrierType {
    BarrierSet::new(collector).select(shape, value_kind, op)
}
