//! Defines the error types for the type system module.
use crate::store::{ModelKind, NodeType, Operator};
use thiserror::Error;

/// Which operand of a binary operation violated a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Why the model algebra refused an operator/kind combination.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("only additive models can be summed")]
    NotAdditive(Side),
    #[error("additive models cannot be multiplied together")]
    AdditiveProduct,
    #[error("a convolution must be applied from the left")]
    WrongOrder,
    #[error("norm convolution can only be used once for one component")]
    DoubleNormConvolution,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("unsupported types for {op}: {lh} ({lh_type}) and {rh} ({rh_type}); offending operand is {offender}")]
    TypeMismatch {
        op: Operator,
        lh: String,
        lh_type: NodeType,
        rh: String,
        rh_type: NodeType,
        offender: String,
    },
    #[error("unsupported kinds for {op}: {lh} ({lh_kind}) and {rh} ({rh_kind}): {reason}")]
    IllegalKinds {
        op: Operator,
        lh: String,
        lh_kind: ModelKind,
        rh: String,
        rh_kind: ModelKind,
        reason: Rejection,
    },
}

impl CompositionError {
    /// The rule that fired, if this is an algebra violation.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            CompositionError::IllegalKinds { reason, .. } => Some(*reason),
            CompositionError::TypeMismatch { .. } => None,
        }
    }
}
