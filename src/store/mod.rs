//! Shared vocabulary types and the node id registry.
pub mod registry;
pub mod types;

pub use types::{Attrs, ConvolutionKind, LabelKind, ModelKind, NodeId, NodeType, Operator};
