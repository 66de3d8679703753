//! Rule for the model composition algebra.
//!
//! Additive models are independent emission components and can only be
//! summed among themselves. Multiplicative and convolution models are
//! transforms applied with `*` onto an additive base, directly or through
//! other transforms. A norm convolution consumes the integrated flux and the
//! evaluator of its operand, so it cannot be nested with another one along a
//! single chain.
use crate::store::{ConvolutionKind, ModelKind, Operator};
use crate::type_system::error::{Rejection, Side};
use serde::{Deserialize, Serialize};

/// How a composite threads the energy grid, the flux array and the flux
/// evaluator between its two compiled operands.
///
/// Chosen once when the composite is constructed; evaluator generation
/// dispatches on it so that no kind inspection happens at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluatorShape {
    /// `add + add`
    AddAdd,
    /// `add * mul`, `mul * add`, `mul * mul`
    Product,
    MulFluxConv,
    MulNormConv,
    FluxConvAdd,
    FluxConvMul,
    FluxConvFluxConv,
    FluxConvNormConv,
    NormConvAdd,
    NormConvMul,
    NormConvFluxConv,
}

impl EvaluatorShape {
    /// Every shape the algebra can produce.
    pub const ALL: [EvaluatorShape; 11] = [
        EvaluatorShape::AddAdd,
        EvaluatorShape::Product,
        EvaluatorShape::MulFluxConv,
        EvaluatorShape::MulNormConv,
        EvaluatorShape::FluxConvAdd,
        EvaluatorShape::FluxConvMul,
        EvaluatorShape::FluxConvFluxConv,
        EvaluatorShape::FluxConvNormConv,
        EvaluatorShape::NormConvAdd,
        EvaluatorShape::NormConvMul,
        EvaluatorShape::NormConvFluxConv,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EvaluatorShape::AddAdd => "add + add",
            EvaluatorShape::Product => "mul * mul",
            EvaluatorShape::MulFluxConv => "mul * con",
            EvaluatorShape::MulNormConv => "mul * ncon",
            EvaluatorShape::FluxConvAdd => "con * add",
            EvaluatorShape::FluxConvMul => "con * mul",
            EvaluatorShape::FluxConvFluxConv => "con * con",
            EvaluatorShape::FluxConvNormConv => "con * ncon",
            EvaluatorShape::NormConvAdd => "ncon * add",
            EvaluatorShape::NormConvMul => "ncon * mul",
            EvaluatorShape::NormConvFluxConv => "ncon * con",
        }
    }
}

/// Outcome of a legal model composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub kind: ModelKind,
    pub shape: EvaluatorShape,
}

impl Resolution {
    fn new(kind: ModelKind, shape: EvaluatorShape) -> Self {
        Self { kind, shape }
    }
}

/// Infers the kind of `lh op rh` and the evaluator shape, or the rule that
/// forbids the combination.
pub fn infer_and_validate(op: Operator, lh: ModelKind, rh: ModelKind) -> Result<Resolution, Rejection> {
    use ConvolutionKind::{Flux, Norm};
    use EvaluatorShape as S;
    use ModelKind::{Additive, Convolution, Multiplicative};

    match op {
        Operator::Add => match (lh, rh) {
            (Additive, Additive) => Ok(Resolution::new(Additive, S::AddAdd)),
            (Additive, _) => Err(Rejection::NotAdditive(Side::Right)),
            _ => Err(Rejection::NotAdditive(Side::Left)),
        },
        Operator::Mul => match (lh, rh) {
            (Additive, Additive) => Err(Rejection::AdditiveProduct),
            (Additive, Convolution(_)) => Err(Rejection::WrongOrder),
            (Convolution(Norm), Convolution(Norm)) => Err(Rejection::DoubleNormConvolution),

            (Additive, Multiplicative) | (Multiplicative, Additive) => Ok(Resolution::new(Additive, S::Product)),
            (Multiplicative, Multiplicative) => Ok(Resolution::new(Multiplicative, S::Product)),
            (Multiplicative, Convolution(Flux)) => Ok(Resolution::new(Convolution(Flux), S::MulFluxConv)),
            (Multiplicative, Convolution(Norm)) => Ok(Resolution::new(Convolution(Norm), S::MulNormConv)),

            (Convolution(Flux), Additive) => Ok(Resolution::new(Additive, S::FluxConvAdd)),
            (Convolution(Flux), Multiplicative) => Ok(Resolution::new(Convolution(Flux), S::FluxConvMul)),
            (Convolution(Flux), Convolution(Flux)) => Ok(Resolution::new(Convolution(Flux), S::FluxConvFluxConv)),
            (Convolution(Flux), Convolution(Norm)) => Ok(Resolution::new(Convolution(Norm), S::FluxConvNormConv)),

            (Convolution(Norm), Additive) => Ok(Resolution::new(Additive, S::NormConvAdd)),
            (Convolution(Norm), Multiplicative) => Ok(Resolution::new(Convolution(Norm), S::NormConvMul)),
            (Convolution(Norm), Convolution(Flux)) => Ok(Resolution::new(Convolution(Norm), S::NormConvFluxConv)),
        },
    }
}
