//! Collector model for the Strata JIT.
//!
//! The JIT needs three things from the garbage collector:
//! - which algorithm is active ([`CollectorKind`])
//! - which barrier a given memory access requires ([`BarrierType`])
//! - how that barrier expands for the active algorithm ([`BarrierOp`])
//!
//! The heap itself lives in the VM; nothing here allocates or collects.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod barrier;
pub mod collector;

pub use barrier::{
    select, AccessOp, AccessShape, BarrierOp, BarrierPlacement, BarrierSet, BarrierType,
    ReceiverShape,
};
pub use collector::CollectorKind;
