//! Defines the identity and labelling shared by every node, and the
//! type-erased [`Node`] used where parameters and models meet.

use crate::graph::{Model, Parameter};
use crate::store::types::RESERVED_ATTRS;
use crate::store::{registry, Attrs, LabelKind, ModelKind, NodeId, NodeType, Operator};
use crate::type_system::rules::operands::family_mismatch;
use crate::type_system::CompositionError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::ops::{Add, Mul};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("got multiple values for attribute \"{0}\"")]
    ReservedAttribute(String),
    #[error("'{0}' is an operation node; only leaves can be modified")]
    NotALeaf(String),
}

// A poisoned lock only means a writer panicked; the guarded value is a plain
// label or number and is still consistent.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Identity, raw labels and attributes of a node.
///
/// For operation nodes the raw labels are the operator symbols; the full
/// label is assembled from the operands on demand.
#[derive(Debug)]
pub struct NodeCore {
    id: NodeId,
    name: String,
    fmt: RwLock<String>,
    attrs: RwLock<Attrs>,
}

impl NodeCore {
    pub(crate) fn new(name: impl Into<String>, fmt: impl Into<String>, attrs: Attrs) -> Result<Self, NodeError> {
        if let Some(key) = attrs.keys().find(|k| RESERVED_ATTRS.contains(&k.as_str())) {
            return Err(NodeError::ReservedAttribute(key.clone()));
        }
        Ok(Self::unchecked(name.into(), fmt.into(), attrs))
    }

    pub(crate) fn operation(op: Operator, fmt: String) -> Self {
        Self::unchecked(op.symbol().to_string(), fmt, Attrs::new())
    }

    fn unchecked(name: String, fmt: String, attrs: Attrs) -> Self {
        Self {
            id: registry::issue(),
            name,
            fmt: RwLock::new(fmt),
            attrs: RwLock::new(attrs),
        }
    }

    pub fn id(&self) -> NodeId { self.id }

    /// The label as given at construction (or last update), without id.
    pub fn raw_label(&self, kind: LabelKind) -> String {
        match kind {
            LabelKind::Name => self.name.clone(),
            LabelKind::Fmt => read(&self.fmt).clone(),
        }
    }

    /// Raw label with the id suffix, e.g. `PowerLaw_3f2a...`.
    pub fn tagged_label(&self, kind: LabelKind) -> String {
        format!("{}_{}", self.raw_label(kind), self.id)
    }

    pub(crate) fn label(&self, kind: LabelKind, tagged: bool) -> String {
        if tagged { self.tagged_label(kind) } else { self.raw_label(kind) }
    }

    pub(crate) fn set_fmt(&self, fmt: String) {
        *write(&self.fmt) = fmt;
    }

    pub fn attrs(&self) -> Attrs { read(&self.attrs).clone() }

    pub fn attr(&self, key: &str) -> Option<serde_json::Value> {
        read(&self.attrs).get(key).cloned()
    }

    pub fn set_attr(&self, key: impl Into<String>, value: serde_json::Value) -> Result<(), NodeError> {
        let key = key.into();
        if RESERVED_ATTRS.contains(&key.as_str()) {
            return Err(NodeError::ReservedAttribute(key));
        }
        write(&self.attrs).insert(key, value);
        Ok(())
    }
}

/// Serialisable description of a single node, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    pub fmt: String,
    pub is_operation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ModelKind>,
    pub attrs: Attrs,
    pub predecessors: Vec<NodeId>,
}

/// Any member of a model tree.
#[derive(Debug, Clone)]
pub enum Node {
    Parameter(Parameter),
    Model(Model),
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Parameter(_) => NodeType::Parameter,
            Node::Model(_) => NodeType::Model,
        }
    }

    pub fn core(&self) -> &NodeCore {
        match self {
            Node::Parameter(p) => p.core(),
            Node::Model(m) => m.core(),
        }
    }

    pub fn id(&self) -> NodeId { self.core().id() }

    /// Name with id suffixes on every leaf.
    pub fn name(&self) -> String { self.label(LabelKind::Name) }

    /// Formula label with id suffixes on every leaf.
    pub fn fmt(&self) -> String { self.label(LabelKind::Fmt) }

    pub fn label(&self, kind: LabelKind) -> String { self.render(kind, true) }

    pub(crate) fn render(&self, kind: LabelKind, tagged: bool) -> String {
        match self {
            Node::Parameter(p) => p.render(kind, tagged),
            Node::Model(m) => m.render(kind, tagged),
        }
    }

    pub fn is_operation(&self) -> bool {
        match self {
            Node::Parameter(p) => p.is_operation(),
            Node::Model(m) => m.is_operation(),
        }
    }

    /// The two operands of an operation node; empty for leaves.
    pub fn predecessors(&self) -> SmallVec<[Node; 2]> {
        match self {
            Node::Parameter(p) => p
                .operation()
                .map(|c| SmallVec::from_buf([Node::from(c.lh().clone()), Node::from(c.rh().clone())]))
                .unwrap_or_default(),
            Node::Model(m) => m
                .operation()
                .map(|c| SmallVec::from_buf([Node::from(c.lh().clone()), Node::from(c.rh().clone())]))
                .unwrap_or_default(),
        }
    }

    pub fn attrs(&self) -> Attrs { self.core().attrs() }

    /// Composes two nodes, failing if they belong to different families or
    /// if the model algebra forbids the combination.
    pub fn combine(&self, rhs: &Node, op: Operator) -> Result<Node, CompositionError> {
        match (self, rhs) {
            (Node::Parameter(l), Node::Parameter(r)) => Ok(Node::Parameter(Parameter::combine(l, r, op))),
            (Node::Model(l), Node::Model(r)) => Model::combine(l, r, op).map(Node::Model),
            _ => Err(family_mismatch(
                op,
                (self.render(LabelKind::Name, false), self.node_type()),
                (rhs.render(LabelKind::Name, false), rhs.node_type()),
            )),
        }
    }

    pub fn summary(&self) -> NodeSummary {
        NodeSummary {
            id: self.id(),
            node_type: self.node_type(),
            name: self.render(LabelKind::Name, false),
            fmt: self.render(LabelKind::Fmt, false),
            is_operation: self.is_operation(),
            kind: match self {
                Node::Model(m) => Some(m.kind()),
                Node::Parameter(_) => None,
            },
            attrs: self.attrs(),
            predecessors: self.predecessors().iter().map(Node::id).collect(),
        }
    }
}

impl From<Parameter> for Node {
    fn from(p: Parameter) -> Self { Node::Parameter(p) }
}

impl From<Model> for Node {
    fn from(m: Model) -> Self { Node::Model(m) }
}

impl Add for Node {
    type Output = Result<Node, CompositionError>;
    fn add(self, rhs: Node) -> Self::Output { self.combine(&rhs, Operator::Add) }
}

impl Mul for Node {
    type Output = Result<Node, CompositionError>;
    fn mul(self, rhs: Node) -> Self::Output { self.combine(&rhs, Operator::Mul) }
}
