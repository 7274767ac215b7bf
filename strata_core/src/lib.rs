//! # Strata Core
//!
//! Core types shared across the Strata JIT backend.
//!
//! - **Kinds**: machine-level value kinds as the VM sees them
//! - **Deoptimization**: guard reason/action metadata
//! - **Error Handling**: compile errors that abort one compilation unit

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod deopt;
pub mod error;
pub mod kind;

pub use deopt::{DeoptAction, DeoptReason, GuardKind};
pub use error::{CompileError, CompileResult};
pub use kind::JavaKind;

/// Strata version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
