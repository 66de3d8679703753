//! Model leaves and their composites.
//!
//! A leaf declares its kind, its parameters and a [`Generator`] producing
//! its numeric function once the final component name is known. Composites
//! resolve their kind and evaluator shape when constructed, so an illegal
//! combination never yields a node.

use crate::compute::compiler::Compiler;
use crate::compute::engine::{CompileOptions, CompiledModel};
use crate::compute::evaluator::{EvaluationError, Evaluator};
use crate::graph::composite::{Composable, Composite};
use crate::graph::node::{NodeCore, NodeError};
use crate::graph::parameter::Parameter;
use crate::graph::site::Site;
use crate::store::{Attrs, ConvolutionKind, LabelKind, ModelKind, NodeId, NodeType, Operator};
use crate::type_system::{infer_and_validate, CompositionError, Resolution};
use indexmap::IndexMap;
use std::fmt;
use std::ops::{Add, Mul};
use std::sync::Arc;
use thiserror::Error;

/// Parameter values of one component, by parameter name.
pub type Params = IndexMap<String, f64>;

/// `f(egrid, params) -> per-bin values`, for additive and multiplicative leaves.
pub type EnergyFn = Arc<dyn Fn(&[f64], &Params) -> Vec<f64> + Send + Sync>;

/// `f(egrid, flux, params) -> per-bin values`.
pub type FluxConvFn = Arc<dyn Fn(&[f64], &[f64], &Params) -> Vec<f64> + Send + Sync>;

/// `f(flux_fn, egrid, flux, params) -> per-bin values`; `flux_fn` evaluates
/// the operand's flux on an arbitrary grid.
pub type NormConvFn = Arc<
    dyn Fn(&dyn Fn(&[f64]) -> Result<Vec<f64>, EvaluationError>, &[f64], &[f64], &Params) -> Result<Vec<f64>, EvaluationError>
        + Send
        + Sync,
>;

/// Builds a leaf function from the final component name.
pub type Factory<F> = Arc<dyn Fn(&str) -> F + Send + Sync>;

/// Evaluator factory of a leaf, typed by the kind of function it produces.
#[derive(Clone)]
pub enum Generator {
    Additive(Factory<EnergyFn>),
    Multiplicative(Factory<EnergyFn>),
    FluxConvolution(Factory<FluxConvFn>),
    NormConvolution(Factory<NormConvFn>),
}

impl Generator {
    pub fn additive<G, F>(factory: G) -> Self
    where
        G: Fn(&str) -> F + Send + Sync + 'static,
        F: Fn(&[f64], &Params) -> Vec<f64> + Send + Sync + 'static,
    {
        Generator::Additive(Arc::new(move |name: &str| Arc::new(factory(name)) as EnergyFn))
    }

    pub fn multiplicative<G, F>(factory: G) -> Self
    where
        G: Fn(&str) -> F + Send + Sync + 'static,
        F: Fn(&[f64], &Params) -> Vec<f64> + Send + Sync + 'static,
    {
        Generator::Multiplicative(Arc::new(move |name: &str| Arc::new(factory(name)) as EnergyFn))
    }

    pub fn flux_convolution<G, F>(factory: G) -> Self
    where
        G: Fn(&str) -> F + Send + Sync + 'static,
        F: Fn(&[f64], &[f64], &Params) -> Vec<f64> + Send + Sync + 'static,
    {
        Generator::FluxConvolution(Arc::new(move |name: &str| Arc::new(factory(name)) as FluxConvFn))
    }

    pub fn norm_convolution<G, F>(factory: G) -> Self
    where
        G: Fn(&str) -> F + Send + Sync + 'static,
        F: Fn(&dyn Fn(&[f64]) -> Result<Vec<f64>, EvaluationError>, &[f64], &[f64], &Params) -> Result<Vec<f64>, EvaluationError>
            + Send
            + Sync
            + 'static,
    {
        Generator::NormConvolution(Arc::new(move |name: &str| Arc::new(factory(name)) as NormConvFn))
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Generator::Additive(_) => ModelKind::Additive,
            Generator::Multiplicative(_) => ModelKind::Multiplicative,
            Generator::FluxConvolution(_) => ModelKind::Convolution(ConvolutionKind::Flux),
            Generator::NormConvolution(_) => ModelKind::Convolution(ConvolutionKind::Norm),
        }
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Generator({})", self.kind())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("model '{name}' is declared {declared} but its generator builds {generator} functions")]
    GeneratorKindMismatch { name: String, declared: ModelKind, generator: ModelKind },
    #[error("model '{name}' got parameter '{param}' more than once")]
    DuplicateParameter { name: String, param: String },
    #[error(transparent)]
    Node(#[from] NodeError),
}

#[derive(Debug)]
pub struct ModelLeaf {
    core: NodeCore,
    kind: ModelKind,
    params: IndexMap<String, Parameter>,
    generator: Generator,
}

impl ModelLeaf {
    pub fn core(&self) -> &NodeCore { &self.core }
    pub fn kind(&self) -> ModelKind { self.kind }
    pub fn params(&self) -> &IndexMap<String, Parameter> { &self.params }
    pub fn generator(&self) -> &Generator { &self.generator }
}

#[derive(Debug)]
pub enum ModelNode {
    Leaf(ModelLeaf),
    Operation(Composite<Model>),
}

/// Shared handle to a model node.
#[derive(Clone)]
pub struct Model(Arc<ModelNode>);

impl Model {
    pub fn new<I, S>(
        name: impl Into<String>,
        fmt: impl Into<String>,
        kind: ModelKind,
        params: I,
        generator: Generator,
    ) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (S, Parameter)>,
        S: Into<String>,
    {
        Self::new_with_attrs(name, fmt, kind, params, generator, Attrs::new())
    }

    pub fn new_with_attrs<I, S>(
        name: impl Into<String>,
        fmt: impl Into<String>,
        kind: ModelKind,
        params: I,
        generator: Generator,
        attrs: Attrs,
    ) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (S, Parameter)>,
        S: Into<String>,
    {
        let name = name.into();
        if generator.kind() != kind {
            return Err(ModelError::GeneratorKindMismatch { name, declared: kind, generator: generator.kind() });
        }
        let mut map = IndexMap::new();
        for (pname, param) in params {
            let pname = pname.into();
            if map.contains_key(&pname) {
                return Err(ModelError::DuplicateParameter { name, param: pname });
            }
            map.insert(pname, param);
        }
        let core = NodeCore::new(name, fmt, attrs)?;
        let leaf = ModelLeaf { core, kind, params: map, generator };
        Ok(Model(Arc::new(ModelNode::Leaf(leaf))))
    }

    /// Leaf whose kind is the one its generator builds.
    pub fn from_generator<I, S>(
        name: impl Into<String>,
        fmt: impl Into<String>,
        params: I,
        generator: Generator,
    ) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (S, Parameter)>,
        S: Into<String>,
    {
        let kind = generator.kind();
        Self::new(name, fmt, kind, params, generator)
    }

    pub fn node(&self) -> &ModelNode { &self.0 }

    pub fn leaf(&self) -> Option<&ModelLeaf> {
        match &*self.0 {
            ModelNode::Leaf(leaf) => Some(leaf),
            ModelNode::Operation(_) => None,
        }
    }

    pub fn operation(&self) -> Option<&Composite<Model>> {
        match &*self.0 {
            ModelNode::Leaf(_) => None,
            ModelNode::Operation(c) => Some(c),
        }
    }

    pub fn core(&self) -> &NodeCore {
        match &*self.0 {
            ModelNode::Leaf(leaf) => &leaf.core,
            ModelNode::Operation(c) => c.core(),
        }
    }

    pub fn id(&self) -> NodeId { self.core().id() }
    pub fn is_operation(&self) -> bool { self.operation().is_some() }
    pub fn name(&self) -> String { self.render(LabelKind::Name, true) }
    pub fn fmt(&self) -> String { self.render(LabelKind::Fmt, true) }

    pub(crate) fn render(&self, kind: LabelKind, tagged: bool) -> String {
        Composable::render(self, kind, tagged)
    }

    pub fn kind(&self) -> ModelKind {
        match &*self.0 {
            ModelNode::Leaf(leaf) => leaf.kind,
            ModelNode::Operation(c) => c.resolution().kind,
        }
    }

    pub fn set_fmt(&self, fmt: impl Into<String>) -> Result<(), NodeError> {
        match &*self.0 {
            ModelNode::Leaf(leaf) => {
                leaf.core.set_fmt(fmt.into());
                Ok(())
            }
            ModelNode::Operation(_) => Err(NodeError::NotALeaf(self.render(LabelKind::Name, false))),
        }
    }

    /// Parameters of every leaf, keyed by the leaf's tagged name.
    pub fn params(&self) -> IndexMap<String, IndexMap<String, Parameter>> {
        match &*self.0 {
            ModelNode::Leaf(leaf) => IndexMap::from([(self.name(), leaf.params.clone())]),
            ModelNode::Operation(c) => {
                let mut params = c.lh().params();
                params.extend(c.rh().params());
                params
            }
        }
    }

    /// Tagged names of the leaves, left to right, repeated if reused.
    pub fn comps(&self) -> Vec<String> {
        match &*self.0 {
            ModelNode::Leaf(_) => vec![self.name()],
            ModelNode::Operation(c) => {
                let mut comps = c.lh().comps();
                comps.extend(c.rh().comps());
                comps
            }
        }
    }

    pub fn site(&self) -> Site { Composable::site(self) }

    pub fn combine(lh: &Model, rh: &Model, op: Operator) -> Result<Model, CompositionError> {
        let c = Composite::new(lh.clone(), rh.clone(), op)?;
        Ok(Model(Arc::new(ModelNode::Operation(c))))
    }

    /// Builds the evaluator of this tree.
    ///
    /// `mapping` translates tagged leaf names to the names the leaves are
    /// known by to the caller; [`LabelSpace::mapping`] gives one.
    ///
    /// [`LabelSpace::mapping`]: crate::display::LabelSpace::mapping
    pub fn generate_func(&self, mapping: &IndexMap<String, String>) -> Result<Evaluator, EvaluationError> {
        Compiler::new(mapping, &CompileOptions::default()).compile(self)
    }

    pub fn compile(&self) -> Result<CompiledModel, EvaluationError> {
        self.compile_with(CompileOptions::default())
    }

    pub fn compile_with(&self, options: CompileOptions) -> Result<CompiledModel, EvaluationError> {
        CompiledModel::new(self, options)
    }
}

impl Composable for Model {
    type Resolution = Resolution;
    type Error = CompositionError;

    const NODE_TYPE: NodeType = NodeType::Model;

    fn core(&self) -> &NodeCore { Model::core(self) }

    fn operation(&self) -> Option<&Composite<Self>> { Model::operation(self) }

    fn resolve(op: Operator, lh: &Self, rh: &Self) -> Result<Resolution, CompositionError> {
        let (lh_kind, rh_kind) = (lh.kind(), rh.kind());
        infer_and_validate(op, lh_kind, rh_kind).map_err(|reason| CompositionError::IllegalKinds {
            op,
            lh: lh.render(LabelKind::Name, false),
            lh_kind,
            rh: rh.render(LabelKind::Name, false),
            rh_kind,
            reason,
        })
    }

    fn site(&self) -> Site {
        match &*self.0 {
            ModelNode::Leaf(leaf) => leaf.params.values().fold(Site::new(), |mut site, p| {
                site.merge(p.site());
                site
            }),
            ModelNode::Operation(c) => c.merged_site(),
        }
    }

    // A convolution leaf applied to an expression reads as function
    // application rather than a product.
    fn operator_fmt(op: Operator, lh: &Self) -> String {
        if op == Operator::Mul && !lh.is_operation() && lh.kind().is_convolution() {
            "*".to_string()
        } else {
            op.tex().to_string()
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model({}: {})", self.render(LabelKind::Name, false), self.kind())
    }
}

impl Add for Model {
    type Output = Result<Model, CompositionError>;
    fn add(self, rhs: Model) -> Self::Output { Model::combine(&self, &rhs, Operator::Add) }
}

impl Mul for Model {
    type Output = Result<Model, CompositionError>;
    fn mul(self, rhs: Model) -> Self::Output { Model::combine(&self, &rhs, Operator::Mul) }
}

impl Add for &Model {
    type Output = Result<Model, CompositionError>;
    fn add(self, rhs: &Model) -> Self::Output { Model::combine(self, rhs, Operator::Add) }
}

impl Mul for &Model {
    type Output = Result<Model, CompositionError>;
    fn mul(self, rhs: &Model) -> Self::Output { Model::combine(self, rhs, Operator::Mul) }
}
