//! Evaluator generation.
//!
//! Leaves are wrapped into the uniform calling convention once their final
//! name is known. Composites combine the evaluators of their operands
//! according to the [`EvaluatorShape`] fixed when the composite was built,
//! so no kind is inspected while evaluating.

use crate::compute::engine::CompileOptions;
use crate::compute::evaluator::{EvaluationError, Evaluator, FluxFn, ParamValues};
use crate::compute::kernel;
use crate::display::label_space::substitute;
use crate::graph::composite::Composite;
use crate::graph::model::{Generator, Model, ModelLeaf, ModelNode, Params};
use crate::store::Operator;
use crate::type_system::EvaluatorShape;
use indexmap::IndexMap;
use log::trace;
use std::borrow::Cow;
use std::sync::Arc;

/// Translates a model tree into a single [`Evaluator`].
pub struct Compiler<'a> {
    mapping: &'a IndexMap<String, String>,
    options: &'a CompileOptions,
}

impl<'a> Compiler<'a> {
    /// `mapping` sends tagged leaf names to the names under which callers
    /// supply parameter values.
    pub fn new(mapping: &'a IndexMap<String, String>, options: &'a CompileOptions) -> Self {
        Self { mapping, options }
    }

    pub fn compile(&self, model: &Model) -> Result<Evaluator, EvaluationError> {
        match model.node() {
            ModelNode::Leaf(leaf) => self.compile_leaf(model, leaf),
            ModelNode::Operation(c) => self.compile_operation(model, c),
        }
    }

    fn compile_leaf(&self, model: &Model, leaf: &ModelLeaf) -> Result<Evaluator, EvaluationError> {
        let tagged = model.name();
        let name = self.mapping.get(&tagged).cloned().ok_or(EvaluationError::UnmappedComponent(tagged))?;
        trace!("generating {} evaluator '{}'", leaf.kind(), name);

        let component: Arc<str> = Arc::from(name.as_str());
        let expected: Vec<String> = leaf.params().keys().cloned().collect();
        let check_shapes = self.options.check_shapes;

        let evaluator = match leaf.generator() {
            Generator::Additive(factory) | Generator::Multiplicative(factory) => {
                let func = factory(&name);
                let comp = Arc::clone(&component);
                Evaluator::new(component, move |p, e, _, _| {
                    let params = lookup(&comp, &expected, p)?;
                    check_bins(&comp, e, func(e, &*params), check_shapes)
                })
            }
            Generator::FluxConvolution(factory) => {
                let func = factory(&name);
                let comp = Arc::clone(&component);
                Evaluator::new(component, move |p, e, f, _| {
                    let params = lookup(&comp, &expected, p)?;
                    let flux = f.ok_or_else(|| EvaluationError::MissingFlux(comp.to_string()))?;
                    check_bins(&comp, e, func(e, flux, &*params), check_shapes)
                })
            }
            Generator::NormConvolution(factory) => {
                let func = factory(&name);
                let comp = Arc::clone(&component);
                Evaluator::new(component, move |p, e, f, ff| {
                    let params = lookup(&comp, &expected, p)?;
                    let flux = f.ok_or_else(|| EvaluationError::MissingFlux(comp.to_string()))?;
                    let ff = ff.ok_or_else(|| EvaluationError::MissingFluxEvaluator(comp.to_string()))?;
                    let bound = |grid: &[f64]| ff.flux(p, grid);
                    check_bins(&comp, e, func(&bound, e, flux, &*params)?, check_shapes)
                })
            }
        };
        Ok(evaluator)
    }

    fn compile_operation(&self, model: &Model, c: &Composite<Model>) -> Result<Evaluator, EvaluationError> {
        let m1 = self.compile(c.lh())?;
        let m2 = self.compile(c.rh())?;
        let shape = c.resolution().shape;
        let label: Arc<str> = Arc::from(substitute(&model.name(), self.mapping));
        trace!("generating '{}' as {} from '{}' and '{}'", label, shape.label(), m1.name(), m2.name());

        let name = Arc::clone(&label);
        let missing_flux = move || EvaluationError::MissingFlux(label.to_string());
        let missing_ff = {
            let label = Arc::clone(&name);
            move || EvaluationError::MissingFluxEvaluator(label.to_string())
        };

        use EvaluatorShape as S;
        use Operator::{Add, Mul};
        let evaluator = match shape {
            S::AddAdd => Evaluator::new(name, move |p, e, _, _| kernel::apply(Add, m1.eval(p, e)?, &m2.eval(p, e)?)),
            S::Product => Evaluator::new(name, move |p, e, _, _| kernel::apply(Mul, m1.eval(p, e)?, &m2.eval(p, e)?)),
            S::MulFluxConv => Evaluator::new(name, move |p, e, f, _| {
                kernel::apply(Mul, m1.eval(p, e)?, &m2.call(p, e, f, None)?)
            }),
            S::MulNormConv => Evaluator::new(name, move |p, e, f, ff| {
                kernel::apply(Mul, m1.eval(p, e)?, &m2.call(p, e, f, ff)?)
            }),
            S::NormConvAdd => Evaluator::new(name, move |p, e, _, _| {
                let flux = m2.eval(p, e)?;
                m1.call(p, e, Some(flux.as_slice()), Some(&m2 as &dyn FluxFn))
            }),
            S::NormConvMul => Evaluator::new(name, move |p, e, f, ff| {
                let flux = kernel::apply(Mul, m2.eval(p, e)?, f.ok_or_else(&missing_flux)?)?;
                let ff = ff.ok_or_else(&missing_ff)?;
                let chained = |params: &ParamValues, grid: &[f64]| -> Result<Vec<f64>, EvaluationError> {
                    kernel::apply(Mul, m2.eval(params, grid)?, &ff.flux(params, grid)?)
                };
                m1.call(p, e, Some(flux.as_slice()), Some(&chained as &dyn FluxFn))
            }),
            S::NormConvFluxConv => Evaluator::new(name, move |p, e, f, ff| {
                let ff = ff.ok_or_else(&missing_ff)?;
                let flux = m2.call(p, e, f, None)?;
                let chained = |params: &ParamValues, grid: &[f64]| -> Result<Vec<f64>, EvaluationError> {
                    let inner = ff.flux(params, grid)?;
                    m2.call(params, grid, Some(inner.as_slice()), None)
                };
                m1.call(p, e, Some(flux.as_slice()), Some(&chained as &dyn FluxFn))
            }),
            S::FluxConvAdd => Evaluator::new(name, move |p, e, _, _| {
                let flux = m2.eval(p, e)?;
                m1.call(p, e, Some(flux.as_slice()), None)
            }),
            S::FluxConvMul => Evaluator::new(name, move |p, e, f, _| {
                let flux = kernel::apply(Mul, m2.eval(p, e)?, f.ok_or_else(&missing_flux)?)?;
                m1.call(p, e, Some(flux.as_slice()), None)
            }),
            S::FluxConvFluxConv => Evaluator::new(name, move |p, e, f, _| {
                let flux = m2.call(p, e, f, None)?;
                m1.call(p, e, Some(flux.as_slice()), None)
            }),
            S::FluxConvNormConv => Evaluator::new(name, move |p, e, f, ff| {
                let flux = m2.call(p, e, f, ff)?;
                m1.call(p, e, Some(flux.as_slice()), None)
            }),
        };
        Ok(evaluator)
    }
}

/// Parameter values of `component`, checked to cover every declared name.
///
/// Components without parameters may be left out of `params`.
fn lookup<'p>(component: &str, expected: &[String], params: &'p ParamValues) -> Result<Cow<'p, Params>, EvaluationError> {
    let Some(values) = params.get(component) else {
        return if expected.is_empty() {
            Ok(Cow::Owned(Params::new()))
        } else {
            Err(EvaluationError::MissingParameters(component.to_string()))
        };
    };
    if let Some(param) = expected.iter().find(|name| !values.contains_key(name.as_str())) {
        return Err(EvaluationError::MissingParameter { component: component.to_string(), param: param.clone() });
    }
    Ok(Cow::Borrowed(values))
}

fn check_bins(component: &str, egrid: &[f64], out: Vec<f64>, enabled: bool) -> Result<Vec<f64>, EvaluationError> {
    let expected = egrid.len().saturating_sub(1);
    if enabled && out.len() != expected {
        return Err(EvaluationError::BinCount {
            component: component.to_string(),
            edges: egrid.len(),
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::LabelSpace;
    use crate::graph::model::tests::{flux_conv, norm_conv, power_law, tbabs};
    use crate::graph::Parameter;
    use crate::store::{LabelKind, ModelKind};

    const EGRID: [f64; 4] = [1.0, 2.0, 4.0, 8.0];

    fn constant_add(name: &str, value: f64) -> Model {
        Model::from_generator(
            name,
            name,
            Vec::<(String, Parameter)>::new(),
            Generator::additive(move |_: &str| move |e: &[f64], _: &Params| vec![value; e.len() - 1]),
        )
        .unwrap()
    }

    fn constant_mul(name: &str, value: f64) -> Model {
        Model::from_generator(
            name,
            name,
            Vec::<(String, Parameter)>::new(),
            Generator::multiplicative(move |_: &str| move |e: &[f64], _: &Params| vec![value; e.len() - 1]),
        )
        .unwrap()
    }

    /// Norm convolution returning `flux + ff(egrid)`, which exposes both inputs.
    fn probe_ncon(name: &str) -> Model {
        Model::from_generator(
            name,
            name,
            Vec::<(String, Parameter)>::new(),
            Generator::norm_convolution(|_: &str| {
                |ff: &dyn Fn(&[f64]) -> Result<Vec<f64>, EvaluationError>,
                 e: &[f64],
                 flux: &[f64],
                 _: &Params|
                 -> Result<Vec<f64>, EvaluationError> {
                    Ok(ff(e)?.iter().zip(flux).map(|(a, b)| a + b).collect())
                }
            }),
        )
        .unwrap()
    }

    fn compile(model: &Model) -> Evaluator {
        let mapping = LabelSpace::new(model.clone()).mapping(LabelKind::Name);
        Compiler::new(&mapping, &CompileOptions::default()).compile(model).unwrap()
    }

    #[test]
    fn test_leaf_is_named_after_resolved_label() {
        let pl = power_law();
        let sum = (&pl + &power_law()).unwrap();
        let ev = compile(&sum);
        assert_eq!(ev.name(), "PowerLaw + PowerLaw2");

        let mut params = ParamValues::new();
        params.insert("PowerLaw".into(), Params::from([("alpha".into(), 0.0), ("K".into(), 1.0)]));
        let err = ev.eval(&params, &EGRID).unwrap_err();
        assert_eq!(err, EvaluationError::MissingParameters("PowerLaw2".into()));

        params.insert("PowerLaw2".into(), Params::from([("alpha".into(), 0.0), ("K".into(), 2.0)]));
        assert_eq!(ev.eval(&params, &EGRID).unwrap(), vec![3.0, 6.0, 12.0]);
    }

    #[test]
    fn test_missing_single_parameter() {
        let ev = compile(&tbabs());
        let params = ParamValues::from([("TBAbs".to_string(), Params::new())]);
        assert!(matches!(
            ev.eval(&params, &EGRID),
            Err(EvaluationError::MissingParameter { ref param, .. }) if param == "nH"
        ));
    }

    #[test]
    fn test_bin_count_is_checked() {
        let bad = Model::from_generator(
            "Bad",
            "Bad",
            Vec::<(String, Parameter)>::new(),
            Generator::additive(|_: &str| |_: &[f64], _: &Params| vec![1.0]),
        )
        .unwrap();
        let err = compile(&bad).eval(&ParamValues::new(), &EGRID).unwrap_err();
        assert!(matches!(err, EvaluationError::BinCount { expected: 3, actual: 1, .. }));

        let mapping = LabelSpace::new(bad.clone()).mapping(LabelKind::Name);
        let lenient = CompileOptions { check_shapes: false, ..CompileOptions::default() };
        let ev = Compiler::new(&mapping, &lenient).compile(&bad).unwrap();
        assert_eq!(ev.eval(&ParamValues::new(), &EGRID).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_unmapped_component() {
        let mapping = IndexMap::new();
        let err = Compiler::new(&mapping, &CompileOptions::default()).compile(&tbabs()).unwrap_err();
        assert!(matches!(err, EvaluationError::UnmappedComponent(_)));
    }

    #[test]
    fn test_standalone_convolution_needs_inputs() {
        let p = ParamValues::new();
        assert!(matches!(compile(&flux_conv("c")).eval(&p, &EGRID), Err(EvaluationError::MissingFlux(_))));
        let flux = [1.0; 3];
        let err = compile(&norm_conv("n")).call(&p, &EGRID, Some(flux.as_slice()), None).unwrap_err();
        assert_eq!(err, EvaluationError::MissingFluxEvaluator("n".into()));
    }

    #[test]
    fn test_product_shapes() {
        let p = ParamValues::new();
        let (a, m) = (constant_add("A", 2.0), constant_mul("M", 3.0));

        let mul_add = (&m * &a).unwrap();
        assert_eq!(compile(&mul_add).eval(&p, &EGRID).unwrap(), vec![6.0; 3]);
        let add_mul = (&a * &m).unwrap();
        assert_eq!(compile(&add_mul).eval(&p, &EGRID).unwrap(), vec![6.0; 3]);

        let mul_mul = (&m * &constant_mul("M", 0.5)).unwrap();
        assert_eq!(mul_mul.kind(), ModelKind::Multiplicative);
        assert_eq!(compile(&mul_mul).eval(&p, &EGRID).unwrap(), vec![1.5; 3]);
        assert_eq!(compile(&(&mul_mul * &a).unwrap()).eval(&p, &EGRID).unwrap(), vec![3.0; 3]);
    }

    #[test]
    fn test_flux_convolution_shapes() {
        let p = ParamValues::new();
        let (a, m) = (constant_add("A", 2.0), constant_mul("M", 3.0));

        let conv_add = (&flux_conv("C") * &a).unwrap();
        assert_eq!(compile(&conv_add).eval(&p, &EGRID).unwrap(), vec![2.0; 3]);

        // (C * M) is a flux convolution applying M first.
        let conv_mul = (&flux_conv("C") * &m).unwrap();
        let flux = [1.0, 2.0, 3.0];
        assert_eq!(compile(&conv_mul).call(&p, &EGRID, Some(flux.as_slice()), None).unwrap(), vec![3.0, 6.0, 9.0]);

        let nested = (&(&flux_conv("C") * &flux_conv("D")).unwrap() * &a).unwrap();
        assert_eq!(compile(&nested).eval(&p, &EGRID).unwrap(), vec![2.0; 3]);

        let mul_conv = (&(&m * &flux_conv("C")).unwrap() * &a).unwrap();
        assert_eq!(compile(&mul_conv).eval(&p, &EGRID).unwrap(), vec![6.0; 3]);
    }

    #[test]
    fn test_norm_convolution_shapes() {
        let p = ParamValues::new();
        let (a, m) = (constant_add("A", 2.0), constant_mul("M", 3.0));

        // N * A: flux = 2, ff(e) = 2
        let ncon_add = (&probe_ncon("N") * &a).unwrap();
        assert_eq!(compile(&ncon_add).eval(&p, &EGRID).unwrap(), vec![4.0; 3]);

        // (N * M) * A: flux = 3 * 2, ff(e) = 3 * 2
        let ncon_mul = (&(&probe_ncon("N") * &m).unwrap() * &a).unwrap();
        assert_eq!(compile(&ncon_mul).eval(&p, &EGRID).unwrap(), vec![12.0; 3]);

        // (N * C) * A with C the identity convolution
        let ncon_con = (&(&probe_ncon("N") * &flux_conv("C")).unwrap() * &a).unwrap();
        assert_eq!(compile(&ncon_con).eval(&p, &EGRID).unwrap(), vec![4.0; 3]);

        // (C * N) * A and (M * N) * A
        let con_ncon = (&(&flux_conv("C") * &probe_ncon("N")).unwrap() * &a).unwrap();
        assert_eq!(compile(&con_ncon).eval(&p, &EGRID).unwrap(), vec![4.0; 3]);
        let mul_ncon = (&(&m * &probe_ncon("N")).unwrap() * &a).unwrap();
        assert_eq!(compile(&mul_ncon).eval(&p, &EGRID).unwrap(), vec![12.0; 3]);
    }
}
