//! Expansion of barrier descriptors into collector-specific operations.
//!
//! Card-table collectors only need a post-write card mark. G1 needs a
//! SATB pre-barrier that logs the overwritten value while marking is
//! active, and a post-barrier that records cross-region edges in the
//! remembered set. Reads of `Reference.referent` under G1 must log the
//! loaded value so a concurrently-cleared referent is not lost.

use smallvec::SmallVec;

use super::{BarrierSet, BarrierType};

/// Where a barrier operation goes relative to the access it protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierPlacement {
    /// Immediately before the access.
    Before,
    /// Immediately after the access.
    After,
}

/// A single collector barrier operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierOp {
    /// Dirty the card covering the slot (precise) or the object (imprecise).
    SerialCardMark {
        /// Mark the card of the exact slot.
        precise: bool,
    },
    /// Log the value about to be overwritten into the SATB queue.
    G1Pre,
    /// Record a cross-region reference in the remembered set.
    G1Post {
        /// Record the exact slot.
        precise: bool,
    },
    /// Log the referent just read into the SATB queue.
    G1ReferentRead,
}

impl BarrierOp {
    /// Where this operation goes.
    pub const fn placement(self) -> BarrierPlacement {
        match self {
            BarrierOp::G1Pre => BarrierPlacement::Before,
            _ => BarrierPlacement::After,
        }
    }

    /// Get a human-readable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            BarrierOp::SerialCardMark { .. } => "SerialWriteBarrier",
            BarrierOp::G1Pre => "G1PreWriteBarrier",
            BarrierOp::G1Post { .. } => "G1PostWriteBarrier",
            BarrierOp::G1ReferentRead => "G1ReferentFieldReadBarrier",
        }
    }
}

impl BarrierSet {
    /// Barrier operations for a write carrying `barrier`.
    ///
    /// `init` writes target a fresh object whose previous slot value is
    /// known to be null, so no SATB pre-barrier is needed.
    pub fn write_barriers(&self, barrier: BarrierType, init: bool) -> SmallVec<[BarrierOp; 2]> {
        let mut ops = SmallVec::new();
        if !barrier.is_some() || !self.collector.needs_write_barrier() {
            return ops;
        }
        let precise = barrier.is_precise();
        if self.collector.is_concurrent_tracing() {
            if !init {
                ops.push(BarrierOp::G1Pre);
            }
            ops.push(BarrierOp::G1Post { precise });
        } else {
            ops.push(BarrierOp::SerialCardMark { precise });
        }
        ops
    }

    /// Barrier operations for a read carrying `barrier`.
    pub fn read_barriers(&self, barrier: BarrierType) -> SmallVec<[BarrierOp; 2]> {
        let mut ops = SmallVec::new();
        if barrier.is_some() && self.collector.is_concurrent_tracing() {
            ops.push(BarrierOp::G1ReferentRead);
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorKind;

    #[test]
    fn test_serial_write_is_single_card_mark() {
        let set = BarrierSet::new(CollectorKind::Serial);
        let ops = set.write_barriers(BarrierType::Imprecise, false);
        assert_eq!(ops.as_slice(), &[BarrierOp::SerialCardMark { precise: false }]);
        assert_eq!(ops[0].placement(), BarrierPlacement::After);
    }

    #[test]
    fn test_g1_write_has_pre_and_post() {
        let set = BarrierSet::new(CollectorKind::G1);
        let ops = set.write_barriers(BarrierType::Precise, false);
        assert_eq!(
            ops.as_slice(),
            &[BarrierOp::G1Pre, BarrierOp::G1Post { precise: true }]
        );
        assert_eq!(ops[0].placement(), BarrierPlacement::Before);
    }

    #[test]
    fn test_g1_init_write_skips_pre() {
        let set = BarrierSet::new(CollectorKind::G1);
        let ops = set.write_barriers(BarrierType::Imprecise, true);
        assert_eq!(ops.as_slice(), &[BarrierOp::G1Post { precise: false }]);
    }

    #[test]
    fn test_none_barrier_expands_to_nothing() {
        for collector in [CollectorKind::Serial, CollectorKind::G1, CollectorKind::Epsilon] {
            let set = BarrierSet::new(collector);
            assert!(set.write_barriers(BarrierType::None, false).is_empty());
            assert!(set.read_barriers(BarrierType::None).is_empty());
        }
    }

    #[test]
    fn test_epsilon_never_expands() {
        let set = BarrierSet::new(CollectorKind::Epsilon);
        assert!(set.write_barriers(BarrierType::Precise, false).is_empty());
    }

    #[test]
    fn test_referent_read_only_under_g1() {
        let g1 = BarrierSet::new(CollectorKind::G1);
        assert_eq!(
            g1.read_barriers(BarrierType::Precise).as_slice(),
            &[BarrierOp::G1ReferentRead]
        );
        let serial = BarrierSet::new(CollectorKind::Serial);
        assert!(serial.read_barriers(BarrierType::Precise).is_empty());
    }
}
