//! Composition engine for parametrized spectral models.
//!
//! Leaves (parameters and models) are combined with `+` and `*` into a DAG.
//! Model composition is checked against the model algebra when the composite
//! is built; a finished tree compiles into a single [`Evaluator`] and
//! exposes the sample/deterministic [`Site`]s an inference engine needs.
//! A [`LabelSpace`] renders the tree with readable, disambiguated names.

pub mod analysis;
pub mod compute;
pub mod display;
pub mod distribution;
pub mod graph;
pub mod store;
pub mod type_system;

pub use compute::{CompileOptions, CompiledModel, EvaluationError, Evaluator, FluxFn, ParamValues};
pub use display::LabelSpace;
pub use distribution::{Distribution, DistributionError, Support};
pub use graph::{
    Deterministic, Generator, Model, ModelError, Node, NodeError, NodeSummary, Parameter, ParameterError, Params,
    Prior, Site, SiteError,
};
pub use store::{ConvolutionKind, LabelKind, ModelKind, NodeId, NodeType, Operator};
pub use type_system::{CompositionError, EvaluatorShape, Rejection};
