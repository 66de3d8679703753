use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Process-wide unique identity of a node.
///
/// Rendered as 32 lowercase hex digits; this is the suffix appended to raw
/// labels before a `LabelSpace` resolves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// The two node families. Composition is only defined within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Parameter,
    Model,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Parameter => write!(f, "parameter"),
            NodeType::Model => write!(f, "model"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Mul,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Mul => "*",
        }
    }

    /// TeX rendering of the operator.
    pub fn tex(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Mul => r"\times",
        }
    }

    #[inline(always)]
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Operator::Add => lhs + rhs,
            Operator::Mul => lhs * rhs,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Selects which of the two labels of a node is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// Plain display name, e.g. `PowerLaw`.
    Name,
    /// TeX formula label, e.g. `\mathrm{PL}`.
    Fmt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvolutionKind {
    /// Operates on the evaluated flux of its operand.
    Flux,
    /// Operates on the integrated flux plus the operand's evaluator.
    Norm,
}

/// Model kind, with the convolution subkind folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Additive,
    Multiplicative,
    Convolution(ConvolutionKind),
}

impl ModelKind {
    pub fn is_convolution(&self) -> bool { matches!(self, ModelKind::Convolution(_)) }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Additive => write!(f, "add"),
            ModelKind::Multiplicative => write!(f, "mul"),
            ModelKind::Convolution(ConvolutionKind::Flux) => write!(f, "con"),
            ModelKind::Convolution(ConvolutionKind::Norm) => write!(f, "ncon"),
        }
    }
}

/// Free-form node attributes.
pub type Attrs = IndexMap<String, serde_json::Value>;

/// Attribute keys owned by the node itself.
pub const RESERVED_ATTRS: [&str; 4] = ["id", "type", "name", "fmt"];
