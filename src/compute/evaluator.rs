//! The uniform calling convention of generated evaluators.

use crate::graph::model::Params;
use crate::graph::site::SiteError;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Parameter values of every component, keyed by resolved component name.
pub type ParamValues = IndexMap<String, Params>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("no parameter values supplied for component '{0}'")]
    MissingParameters(String),
    #[error("component '{component}' has no value for parameter '{param}'")]
    MissingParameter { component: String, param: String },
    #[error("convolution '{0}' needs an input flux")]
    MissingFlux(String),
    #[error("norm convolution '{0}' needs a flux evaluator")]
    MissingFluxEvaluator(String),
    #[error("component '{component}' returned {actual} values for {edges} grid edges, expected {expected}")]
    BinCount { component: String, edges: usize, expected: usize, actual: usize },
    #[error("cannot combine arrays of {left} and {right} bins")]
    ShapeMismatch { left: usize, right: usize },
    #[error("component '{0}' has no entry in the label mapping")]
    UnmappedComponent(String),
    #[error("energy grid needs at least two edges, got {0}")]
    DegenerateGrid(usize),
    #[error(transparent)]
    Site(#[from] SiteError),
}

/// Something that evaluates flux on an energy grid.
///
/// Norm convolutions receive one of these to re-evaluate their operand on
/// grids of their choosing.
pub trait FluxFn {
    fn flux(&self, params: &ParamValues, egrid: &[f64]) -> Result<Vec<f64>, EvaluationError>;
}

impl<F> FluxFn for F
where
    F: Fn(&ParamValues, &[f64]) -> Result<Vec<f64>, EvaluationError>,
{
    fn flux(&self, params: &ParamValues, egrid: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        self(params, egrid)
    }
}

type EvalFn = dyn Fn(&ParamValues, &[f64], Option<&[f64]>, Option<&dyn FluxFn>) -> Result<Vec<f64>, EvaluationError>
    + Send
    + Sync;

/// A compiled model function with a display name.
///
/// `call(params, egrid, flux, flux_fn)` returns one value per bin of
/// `egrid`. Additive and multiplicative evaluators ignore `flux` and
/// `flux_fn`.
#[derive(Clone)]
pub struct Evaluator {
    name: Arc<str>,
    func: Arc<EvalFn>,
}

impl Evaluator {
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&ParamValues, &[f64], Option<&[f64]>, Option<&dyn FluxFn>) -> Result<Vec<f64>, EvaluationError>
            + Send
            + Sync
            + 'static,
    {
        Self { name: name.into(), func: Arc::new(func) }
    }

    pub fn name(&self) -> &str { &self.name }

    /// Same function under another name.
    pub fn renamed(&self, name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into(), func: Arc::clone(&self.func) }
    }

    #[inline]
    pub fn call(
        &self,
        params: &ParamValues,
        egrid: &[f64],
        flux: Option<&[f64]>,
        flux_fn: Option<&dyn FluxFn>,
    ) -> Result<Vec<f64>, EvaluationError> {
        (self.func)(params, egrid, flux, flux_fn)
    }

    /// Evaluates without input flux.
    pub fn eval(&self, params: &ParamValues, egrid: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        self.call(params, egrid, None, None)
    }
}

impl FluxFn for Evaluator {
    fn flux(&self, params: &ParamValues, egrid: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        self.eval(params, egrid)
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Evaluator({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renamed_keeps_behaviour() {
        let ones = Evaluator::new("ones", |_, e, _, _| Ok(vec![1.0; e.len() - 1]));
        let alias = ones.renamed("PowerLaw");
        assert_eq!(alias.name(), "PowerLaw");
        assert_eq!(ones.name(), "ones");
        let egrid = [1.0, 2.0, 3.0];
        assert_eq!(alias.eval(&ParamValues::new(), &egrid), ones.eval(&ParamValues::new(), &egrid));
    }

    #[test]
    fn test_closure_and_evaluator_are_flux_fns() {
        let doubled = |_: &ParamValues, e: &[f64]| -> Result<Vec<f64>, EvaluationError> {
            Ok(e.windows(2).map(|w| 2.0 * (w[1] - w[0])).collect())
        };
        let sources: [&dyn FluxFn; 2] = [&doubled, &Evaluator::new("d", move |p, e, _, _| doubled(p, e))];
        for src in sources {
            assert_eq!(src.flux(&ParamValues::new(), &[0.0, 1.0, 3.0]).unwrap(), vec![2.0, 4.0]);
        }
    }
}
