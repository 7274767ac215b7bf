//! Error types and result definitions for Strata.
//!
//! Every error in this module aborts the compilation of one unit: the
//! caller discards the graph and falls back to the interpreter. None of
//! them may take down the host process.
//!
//! Guard failures are *not* errors. They are ordinary deoptimization
//! events and are modelled by [`crate::deopt`].

use std::fmt;
use thiserror::Error;

/// The unified result type used throughout Strata.
pub type CompileResult<T> = Result<T, CompileError>;

/// Lowering stage name, carried by stage errors without depending on the IR crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageName(pub &'static str);

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Errors that abort the compilation of the enclosing unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A node reached the dispatcher that no lowering handler covers.
    #[error("InternalError: node implementing lowering not handled: {kind} (n{node})")]
    UnhandledNode {
        /// Debug name of the node kind.
        kind: String,
        /// Index of the offending node.
        node: u32,
    },

    /// A virtual call must be expanded but its target has no dispatch-table slot.
    #[error("InternalError: method {method} has no vtable slot")]
    MissingVtableSlot {
        /// Qualified method name.
        method: String,
    },

    /// The lowering stage was asked to move backwards.
    #[error("InternalError: lowering stage cannot go from {from} back to {to}")]
    StageRegression {
        /// Current stage.
        from: StageName,
        /// Requested stage.
        to: StageName,
    },

    /// The graph violates a structural invariant.
    #[error("InvalidGraph: {message}")]
    InvalidGraph {
        /// Error description.
        message: String,
    },

    /// A template family failed to instantiate.
    #[error("TemplateError: {family}: {message}")]
    Template {
        /// Template family name.
        family: &'static str,
        /// Error description.
        message: String,
    },
}

impl CompileError {
    /// Create an unhandled-node error.
    #[must_use]
    pub fn unhandled(kind: impl Into<String>, node: u32) -> Self {
        Self::UnhandledNode {
            kind: kind.into(),
            node,
        }
    }

    /// Create a missing-vtable-slot error.
    #[must_use]
    pub fn missing_vtable_slot(method: impl Into<String>) -> Self {
        Self::MissingVtableSlot {
            method: method.into(),
        }
    }

    /// Create a stage regression error.
    #[must_use]
    pub fn stage_regression(from: &'static str, to: &'static str) -> Self {
        Self::StageRegression {
            from: StageName(from),
            to: StageName(to),
        }
    }

    /// Create an invalid-graph error.
    #[must_use]
    pub fn invalid_graph(message: impl Into<String>) -> Self {
        Self::InvalidGraph {
            message: message.into(),
        }
    }

    /// Create a template error.
    #[must_use]
    pub fn template(family: &'static str, message: impl Into<String>) -> Self {
        Self::Template {
            family,
            message: message.into(),
        }
    }

    /// Whether this error indicates a compiler bug rather than bad input.
    ///
    /// Both kinds bail out of the current unit; internal errors are
    /// additionally worth reporting.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::UnhandledNode { .. } | Self::MissingVtableSlot { .. } | Self::StageRegression { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhandled_node_message() {
        let err = CompileError::unhandled("Read", 17);
        assert_eq!(
            err.to_string(),
            "InternalError: node implementing lowering not handled: Read (n17)"
        );
        assert!(err.is_internal());
    }

    #[test]
    fn test_missing_vtable_slot() {
        let err = CompileError::missing_vtable_slot("Shape.area");
        match &err {
            CompileError::MissingVtableSlot { method } => assert_eq!(method, "Shape.area"),
            _ => panic!("Expected MissingVtableSlot"),
        }
        assert!(err.is_internal());
    }

    #[test]
    fn test_stage_regression_message() {
        let err = CompileError::stage_regression("GuardsFixed", "GuardsFloating");
        assert_eq!(
            err.to_string(),
            "InternalError: lowering stage cannot go from GuardsFixed back to GuardsFloating"
        );
    }

    #[test]
    fn test_template_error_is_not_internal() {
        let err = CompileError::template("NewObject", "no fast path for multi-array");
        assert!(!err.is_internal());
        assert!(err.to_string().starts_with("TemplateError: NewObject"));
    }

    #[test]
    fn test_invalid_graph() {
        let err = CompileError::invalid_graph("dangling input");
        assert_eq!(err.to_string(), "InvalidGraph: dangling input");
    }
}
