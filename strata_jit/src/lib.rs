//! HotSpot-facing graph lowering for the Strata JIT.
//!
//! Takes a sea-of-nodes graph expressing Java semantics and rewrites it
//! into explicit memory accesses with:
//! - resolved addresses (`base + displacement + index * scale`)
//! - null and bounds guards carrying deoptimization metadata
//! - collector write and read barriers
//! - runtime calls for allocation, locking and type checks
//!
//! A [`VmConfig`] snapshot describes the VM's object layout. Lowering runs
//! once per stage through [`lower::LoweringPhase`], followed by
//! [`lower::WriteBarrierAddition`].
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod config;
pub mod ir;
pub mod lower;

pub use config::{LoweringOptions, VmConfig};
pub use ir::{Graph, GraphBuilder, NodeId, NodeKind};
pub use lower::{
    HotSpotLoweringProvider, LowerOutcome, LoweringPhase, LoweringStage, Phase,
    WriteBarrierAddition,
};
