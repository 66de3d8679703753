//! Rule for operand family matching: parameters compose with parameters,
//! models with models.
use crate::store::{NodeType, Operator};
use crate::type_system::error::CompositionError;

/// Builds the error for operands of different node families.
///
/// The right-hand operand is reported as the offender: it is the one being
/// applied to an existing expression.
pub(crate) fn family_mismatch(
    op: Operator,
    (lh, lh_type): (String, NodeType),
    (rh, rh_type): (String, NodeType),
) -> CompositionError {
    CompositionError::TypeMismatch {
        op,
        lh,
        lh_type,
        offender: rh.clone(),
        rh,
        rh_type,
    }
}
