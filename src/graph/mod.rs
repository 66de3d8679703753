//! The node graph: parameter and model leaves, their composites, and the
//! sample/deterministic sites they expose.

pub mod composite;
pub mod model;
pub mod node;
pub mod parameter;
pub mod site;

pub use self::composite::{Composable, Composite};
pub use self::model::{
    EnergyFn, Factory, FluxConvFn, Generator, Model, ModelError, ModelLeaf, ModelNode, NormConvFn, Params,
};
pub use self::node::{Node, NodeCore, NodeError, NodeSummary};
pub use self::parameter::{Deterministic, Parameter, ParameterError, ParameterLeaf, ParameterNode, Prior};
pub use self::site::{Combinator, DeterministicSite, Site, SiteError};
