//! Errors reported by the lowering engine.
//!
//! Every error is fatal to the lowering pass that produced it: no partial fragments are
//! returned and nothing is substituted, since recovering silently would produce incorrect
//! numerical code.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoweringError {
    /// Dispatch reached a node kind without a concrete handler.
    #[error("unsupported node ({reason}): {node}")]
    UnsupportedNode { node: String, reason: String },

    /// The expression is well-formed syntactically, but violates a structural rule of the lowering,
    /// such as a double restriction or a component count mismatch.
    #[error("structural violation in {node}: {message}")]
    StructuralViolation { node: String, message: String },

    /// A handler received a number of operands it does not accept.
    #[error("arity violation in {node}: expected {expected} operand(s), found {found}")]
    ArityViolation {
        node: String,
        expected: String,
        found: usize,
    },

    /// The tabulator could not produce basis values for an element.
    #[error("failed to tabulate element {element}: {message}")]
    Tabulation { element: String, message: String },
}

impl LoweringError {
    pub fn unsupported(node: impl ToString, reason: impl Into<String>) -> Self {
        Self::UnsupportedNode {
            node: node.to_string(),
            reason: reason.into(),
        }
    }

    pub fn structural(node: impl ToString, message: impl Into<String>) -> Self {
        Self::StructuralViolation {
            node: node.to_string(),
            message: message.into(),
        }
    }

    pub fn arity(node: impl ToString, expected: impl ToString, found: usize) -> Self {
        Self::ArityViolation {
            node: node.to_string(),
            expected: expected.to_string(),
            found,
        }
    }

    pub fn tabulation(element: impl Into<String>, report: &eyre::Report) -> Self {
        Self::Tabulation {
            element: element.into(),
            message: format!("{report:#}"),
        }
    }

    pub fn is_unsupported_node(&self) -> bool {
        matches!(self, Self::UnsupportedNode { .. })
    }

    pub fn is_structural_violation(&self) -> bool {
        matches!(self, Self::StructuralViolation { .. })
    }

    pub fn is_arity_violation(&self) -> bool {
        matches!(self, Self::ArityViolation { .. })
    }
}

pub type Result<T> = std::result::Result<T, LoweringError>;
