//! The static rules of node composition.
//!
//! Every rule runs when a composite is constructed; an illegal combination
//! never produces a node, so nothing downstream has to re-check kinds.

pub use self::error::{CompositionError, Rejection, Side};
pub use self::rules::algebra::{infer_and_validate, EvaluatorShape, Resolution};

mod error;
pub(crate) mod rules {
    pub mod algebra;
    pub mod operands;
}
