//! Collector algorithms the JIT can target.
//!
//! The compiler never talks to the collector directly. It only needs to
//! know which barriers the active algorithm expects compiled code to emit.

use std::fmt;

/// The garbage collector selected for the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CollectorKind {
    /// Single-threaded generational collector with a card table.
    #[default]
    Serial,
    /// Parallel generational collector with a card table.
    Parallel,
    /// Region-based concurrent collector with SATB marking.
    G1,
    /// No-op collector: nothing is ever reclaimed, no barriers are needed.
    Epsilon,
}

impl CollectorKind {
    /// Whether reference stores must be followed by a card mark or similar.
    ///
    /// False only for collectors that track no generations at all.
    #[inline]
    pub const fn needs_write_barrier(self) -> bool {
        !matches!(self, CollectorKind::Epsilon)
    }

    /// Whether the collector marks concurrently with a snapshot-at-the-beginning
    /// invariant, which requires pre-write barriers and referent read barriers.
    #[inline]
    pub const fn is_concurrent_tracing(self) -> bool {
        matches!(self, CollectorKind::G1)
    }

    /// Whether the collector uses a plain card table for old-to-young tracking.
    #[inline]
    pub const fn uses_card_table(self) -> bool {
        matches!(self, CollectorKind::Serial | CollectorKind::Parallel)
    }

    /// Get a human-readable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            CollectorKind::Serial => "Serial",
            CollectorKind::Parallel => "Parallel",
            CollectorKind::G1 => "G1",
            CollectorKind::Epsilon => "Epsilon",
        }
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
