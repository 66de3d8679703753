//! Parameter leaves and their `+`/`*` composites.
//!
//! A leaf carries a default value validated against its prior, and may
//! declare one derived ("deterministic") quantity. A composite computes its
//! default from its operands and contributes a deterministic site so that an
//! inference engine can rebuild its value after sampling the leaves.

use crate::distribution::{Distribution, DistributionError, Support, Uniform};
use crate::graph::composite::{Composable, Composite};
use crate::graph::node::{read, write, NodeCore, NodeError};
use crate::graph::site::{Combinator, DeterministicSite, Site};
use crate::store::{Attrs, LabelKind, NodeId, NodeType, Operator};
use std::convert::Infallible;
use std::fmt;
use std::ops::{Add, Mul};
use std::sync::{Arc, RwLock};
use thiserror::Error;

const PLACEHOLDER: &str = "{name}";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("default value {default} of '{name}' is outside the support {support} of {dist}")]
    OutsideSupport { name: String, default: f64, dist: String, support: Support },
    #[error("default value {default} of '{name}' must equal its fixed value {value}")]
    FixedMismatch { name: String, default: f64, value: f64 },
    #[error("default value of '{name}' must be finite, got {default}")]
    NonFiniteDefault { name: String, default: f64 },
    #[error("malformed deterministic site '{template}': {reason}")]
    MalformedDeterministic { template: String, reason: &'static str },
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Either a prior distribution or a constant.
#[derive(Debug, Clone)]
pub enum Prior {
    Distribution(Arc<dyn Distribution>),
    Fixed(f64),
}

impl Prior {
    pub fn distribution(dist: impl Distribution + 'static) -> Self {
        Prior::Distribution(Arc::new(dist))
    }

    pub fn fixed_value(&self) -> Option<f64> {
        match self {
            Prior::Fixed(v) => Some(*v),
            Prior::Distribution(_) => None,
        }
    }

    fn validate(&self, name: &str, default: f64) -> Result<(), ParameterError> {
        if !default.is_finite() {
            return Err(ParameterError::NonFiniteDefault { name: name.to_string(), default });
        }
        match self {
            Prior::Fixed(value) if default != *value => {
                Err(ParameterError::FixedMismatch { name: name.to_string(), default, value: *value })
            }
            Prior::Distribution(d) if !d.in_support(default) => Err(ParameterError::OutsideSupport {
                name: name.to_string(),
                default,
                dist: d.name().to_string(),
                support: d.support(),
            }),
            _ => Ok(()),
        }
    }
}

/// One derived quantity of a parameter leaf.
///
/// The template names the derived site, with `{name}` replaced by the
/// parameter's resolved name; the combinator maps the parameter value to the
/// derived value.
#[derive(Clone)]
pub struct Deterministic {
    template: String,
    combinator: Combinator,
}

impl Deterministic {
    pub fn new<F>(template: impl Into<String>, f: F) -> Result<Self, ParameterError>
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self::with_arity(template, 1, move |args: &[f64]| f(args.first().copied().unwrap_or(f64::NAN)))
    }

    /// Like [`Deterministic::new`] with an explicit dependency arity, which
    /// must match the single placeholder of the template.
    pub fn with_arity<F>(template: impl Into<String>, arity: usize, f: F) -> Result<Self, ParameterError>
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        let template = template.into();
        let malformed = |reason| ParameterError::MalformedDeterministic { template: template.clone(), reason };
        if arity != 1 {
            return Err(malformed("a derived quantity depends on exactly one parameter"));
        }
        if template.matches(PLACEHOLDER).count() != 1 {
            return Err(malformed("template must contain exactly one `{name}` placeholder"));
        }
        if template.replace(PLACEHOLDER, "").contains(['{', '}']) {
            return Err(malformed("template contains a placeholder other than `{name}`"));
        }
        Ok(Self { template, combinator: Arc::new(f) })
    }

    pub fn template(&self) -> &str { &self.template }

    pub fn site_name(&self, name: &str) -> String {
        self.template.replace(PLACEHOLDER, name)
    }
}

impl fmt::Debug for Deterministic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deterministic").field("template", &self.template).finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct ParameterLeaf {
    core: NodeCore,
    default: RwLock<f64>,
    prior: Prior,
    deterministic: Option<Deterministic>,
}

impl ParameterLeaf {
    pub fn core(&self) -> &NodeCore { &self.core }
    pub fn default(&self) -> f64 { *read(&self.default) }
    pub fn prior(&self) -> &Prior { &self.prior }
    pub fn deterministic(&self) -> Option<&Deterministic> { self.deterministic.as_ref() }
}

#[derive(Debug)]
pub enum ParameterNode {
    Leaf(ParameterLeaf),
    Operation(Composite<Parameter>),
}

/// Shared handle to a parameter node.
#[derive(Clone)]
pub struct Parameter(Arc<ParameterNode>);

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        fmt: impl Into<String>,
        default: f64,
        prior: Prior,
        deterministic: Option<Deterministic>,
    ) -> Result<Self, ParameterError> {
        Self::new_with_attrs(name, fmt, default, prior, deterministic, Attrs::new())
    }

    pub fn new_with_attrs(
        name: impl Into<String>,
        fmt: impl Into<String>,
        default: f64,
        prior: Prior,
        deterministic: Option<Deterministic>,
        attrs: Attrs,
    ) -> Result<Self, ParameterError> {
        let name = name.into();
        prior.validate(&name, default)?;
        let core = NodeCore::new(name, fmt, attrs)?;
        let leaf = ParameterLeaf { core, default: RwLock::new(default), prior, deterministic };
        Ok(Parameter(Arc::new(ParameterNode::Leaf(leaf))))
    }

    /// Parameter with a uniform prior on `[low, high]`.
    pub fn uniform(
        name: impl Into<String>,
        fmt: impl Into<String>,
        default: f64,
        low: f64,
        high: f64,
    ) -> Result<Self, ParameterError> {
        Self::new(name, fmt, default, Prior::distribution(Uniform::new(low, high)?), None)
    }

    /// Parameter held at a constant value.
    pub fn fixed(name: impl Into<String>, fmt: impl Into<String>, value: f64) -> Result<Self, ParameterError> {
        Self::new(name, fmt, value, Prior::Fixed(value), None)
    }

    pub fn node(&self) -> &ParameterNode { &self.0 }

    pub fn leaf(&self) -> Option<&ParameterLeaf> {
        match &*self.0 {
            ParameterNode::Leaf(leaf) => Some(leaf),
            ParameterNode::Operation(_) => None,
        }
    }

    pub fn operation(&self) -> Option<&Composite<Parameter>> {
        match &*self.0 {
            ParameterNode::Leaf(_) => None,
            ParameterNode::Operation(c) => Some(c),
        }
    }

    pub fn core(&self) -> &NodeCore {
        match &*self.0 {
            ParameterNode::Leaf(leaf) => &leaf.core,
            ParameterNode::Operation(c) => c.core(),
        }
    }

    pub fn id(&self) -> NodeId { self.core().id() }
    pub fn is_operation(&self) -> bool { self.operation().is_some() }
    pub fn name(&self) -> String { self.render(LabelKind::Name, true) }
    pub fn fmt(&self) -> String { self.render(LabelKind::Fmt, true) }

    pub(crate) fn render(&self, kind: LabelKind, tagged: bool) -> String {
        Composable::render(self, kind, tagged)
    }

    /// The leaf default, or the operator applied to the operands' defaults.
    pub fn default_value(&self) -> f64 {
        match &*self.0 {
            ParameterNode::Leaf(leaf) => leaf.default(),
            ParameterNode::Operation(c) => c.op().apply(c.lh().default_value(), c.rh().default_value()),
        }
    }

    /// Updates the default of a leaf after checking it against the prior.
    pub fn set_default(&self, value: f64) -> Result<(), ParameterError> {
        let leaf = self.leaf_or_err()?;
        leaf.prior.validate(&leaf.core.raw_label(LabelKind::Name), value)?;
        *write(&leaf.default) = value;
        Ok(())
    }

    pub fn set_fmt(&self, fmt: impl Into<String>) -> Result<(), NodeError> {
        self.leaf_or_err()?.core.set_fmt(fmt.into());
        Ok(())
    }

    fn leaf_or_err(&self) -> Result<&ParameterLeaf, NodeError> {
        self.leaf().ok_or_else(|| NodeError::NotALeaf(self.render(LabelKind::Name, false)))
    }

    pub fn site(&self) -> Site { Composable::site(self) }

    pub fn combine(lh: &Parameter, rh: &Parameter, op: Operator) -> Parameter {
        match Composite::new(lh.clone(), rh.clone(), op) {
            Ok(c) => Parameter(Arc::new(ParameterNode::Operation(c))),
            Err(never) => match never {},
        }
    }
}

impl Composable for Parameter {
    type Resolution = ();
    type Error = Infallible;

    const NODE_TYPE: NodeType = NodeType::Parameter;

    fn core(&self) -> &NodeCore { Parameter::core(self) }

    fn operation(&self) -> Option<&Composite<Self>> { Parameter::operation(self) }

    fn resolve(_op: Operator, _lh: &Self, _rh: &Self) -> Result<(), Infallible> { Ok(()) }

    fn site(&self) -> Site {
        match &*self.0 {
            ParameterNode::Leaf(leaf) => {
                let name = self.name();
                let mut site = Site::new();
                if let Some(det) = &leaf.deterministic {
                    site.deterministic.insert(
                        det.site_name(&name),
                        DeterministicSite::new(vec![name.clone()], det.combinator.clone()),
                    );
                }
                site.sample.insert(name, leaf.prior.clone());
                site
            }
            ParameterNode::Operation(c) => {
                let mut site = c.merged_site();
                let op = c.op();
                let combinator: Combinator = Arc::new(move |args: &[f64]| match args {
                    [l, r] => op.apply(*l, *r),
                    _ => f64::NAN,
                });
                site.deterministic
                    .insert(self.name(), DeterministicSite::new(vec![c.lh().name(), c.rh().name()], combinator));
                site
            }
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parameter({})", self.render(LabelKind::Name, false))
    }
}

impl Add for Parameter {
    type Output = Parameter;
    fn add(self, rhs: Parameter) -> Parameter { Parameter::combine(&self, &rhs, Operator::Add) }
}

impl Mul for Parameter {
    type Output = Parameter;
    fn mul(self, rhs: Parameter) -> Parameter { Parameter::combine(&self, &rhs, Operator::Mul) }
}

impl Add for &Parameter {
    type Output = Parameter;
    fn add(self, rhs: &Parameter) -> Parameter { Parameter::combine(self, rhs, Operator::Add) }
}

impl Mul for &Parameter {
    type Output = Parameter;
    fn mul(self, rhs: &Parameter) -> Parameter { Parameter::combine(self, rhs, Operator::Mul) }
}
