use crate::compute::compiler::Compiler;
use crate::compute::evaluator::{EvaluationError, Evaluator, FluxFn, ParamValues};
use crate::display::LabelSpace;
use crate::graph::model::{Model, Params};
use crate::graph::site::{Site, SiteError};
use crate::graph::Node;
use crate::store::LabelKind;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

/// Knobs for evaluator generation and batch evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Verify that every leaf returns one value per bin.
    pub check_shapes: bool,
    /// Smallest batch evaluated in parallel.
    pub parallel_batch_threshold: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { check_shapes: true, parallel_batch_threshold: 16 }
    }
}

/// A model tree paired with its generated evaluator and label space.
///
/// Leaves are known to the evaluator by their resolved names, so parameter
/// values are keyed the way [`CompiledModel::comps`] reports them.
pub struct CompiledModel {
    model: Model,
    labels: LabelSpace,
    evaluator: Evaluator,
    options: CompileOptions,
}

impl CompiledModel {
    pub fn new(model: &Model, options: CompileOptions) -> Result<Self, EvaluationError> {
        let labels = LabelSpace::new(Node::from(model.clone()));
        let mapping = labels.mapping(LabelKind::Name);
        let evaluator = Compiler::new(&mapping, &options).compile(model)?;
        debug!("compiled '{}' ({} components)", evaluator.name(), mapping.len());
        Ok(Self { model: model.clone(), labels, evaluator, options })
    }

    pub fn model(&self) -> &Model { &self.model }
    pub fn evaluator(&self) -> &Evaluator { &self.evaluator }
    pub fn labels(&self) -> &LabelSpace { &self.labels }
    pub fn options(&self) -> &CompileOptions { &self.options }

    pub fn name(&self) -> String { self.labels.name() }
    pub fn fmt(&self) -> String { self.labels.fmt() }

    /// Resolved names of the leaves, left to right, repeated if reused.
    pub fn comps(&self) -> Vec<String> {
        self.model.comps().iter().map(|c| self.resolve(c)).collect()
    }

    /// Resolved component name, then parameter name, to the site that
    /// holds the parameter's value.
    pub fn params(&self) -> IndexMap<String, IndexMap<String, String>> {
        self.model
            .params()
            .into_iter()
            .map(|(comp, params)| (self.resolve(&comp), params.iter().map(|(k, p)| (k.clone(), p.name())).collect()))
            .collect()
    }

    pub fn site(&self) -> Site { self.model.site() }

    /// Parameter values at every parameter's current default.
    pub fn default_param_values(&self) -> ParamValues {
        self.model
            .params()
            .into_iter()
            .map(|(comp, params)| {
                let values: Params = params.iter().map(|(k, p)| (k.clone(), p.default_value())).collect();
                (self.resolve(&comp), values)
            })
            .collect()
    }

    /// Parameter values from sample-site values, computing composite
    /// parameters by replaying the deterministic sites.
    pub fn param_values(&self, samples: &IndexMap<String, f64>) -> Result<ParamValues, EvaluationError> {
        let values = self.site().replay(samples)?;
        let mut out = ParamValues::new();
        for (comp, params) in self.params() {
            let mut resolved = Params::new();
            for (pname, site_name) in params {
                let value = values.get(&site_name).copied().ok_or(SiteError::MissingValue(site_name))?;
                resolved.insert(pname, value);
            }
            out.insert(comp, resolved);
        }
        Ok(out)
    }

    pub fn evaluate(&self, params: &ParamValues, egrid: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        self.evaluate_with(params, egrid, None, None)
    }

    /// Evaluates with an input flux and flux evaluator, as needed when the
    /// whole tree is itself a convolution.
    pub fn evaluate_with(
        &self,
        params: &ParamValues,
        egrid: &[f64],
        flux: Option<&[f64]>,
        flux_fn: Option<&dyn FluxFn>,
    ) -> Result<Vec<f64>, EvaluationError> {
        if egrid.len() < 2 {
            return Err(EvaluationError::DegenerateGrid(egrid.len()));
        }
        self.evaluator.call(params, egrid, flux, flux_fn)
    }

    /// Evaluates every parameter set of `batch` on the same grid.
    pub fn evaluate_batch(&self, batch: &[ParamValues], egrid: &[f64]) -> Result<Vec<Vec<f64>>, EvaluationError> {
        if batch.len() >= self.options.parallel_batch_threshold {
            return self.evaluate_parallel(batch, egrid);
        }
        batch.iter().map(|p| self.evaluate(p, egrid)).collect()
    }

    #[cfg(feature = "parallel")]
    fn evaluate_parallel(&self, batch: &[ParamValues], egrid: &[f64]) -> Result<Vec<Vec<f64>>, EvaluationError> {
        use rayon::prelude::*;
        batch.par_iter().map(|p| self.evaluate(p, egrid)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate_parallel(&self, batch: &[ParamValues], egrid: &[f64]) -> Result<Vec<Vec<f64>>, EvaluationError> {
        batch.iter().map(|p| self.evaluate(p, egrid)).collect()
    }

    fn resolve(&self, tagged: &str) -> String {
        self.labels.resolve(tagged, LabelKind::Name).unwrap_or_else(|| tagged.to_string())
    }
}
