use rstest::rstest;
use specgraph_core::{
    CompositionError, EvaluationError, FluxFn, Generator, LabelKind, LabelSpace, Model, ModelKind, ParamValues,
    Parameter, Params, Rejection,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn power_law() -> Model {
    let alpha = Parameter::uniform("alpha", r"\alpha", 1.0, -3.0, 5.0).unwrap();
    let norm = Parameter::uniform("K", "K", 1.0, 1e-5, 1e5).unwrap();
    Model::from_generator(
        "PowerLaw",
        r"\mathrm{PL}",
        [("alpha", alpha), ("K", norm)],
        Generator::additive(|_: &str| {
            |egrid: &[f64], p: &Params| -> Vec<f64> {
                egrid.windows(2).map(|w| p["K"] * (0.5 * (w[0] + w[1])).powf(-p["alpha"]) * (w[1] - w[0])).collect()
            }
        }),
    )
    .unwrap()
}

fn constant(name: &str, kind: ModelKind, value: f64) -> Model {
    let func = move |_: &str| move |egrid: &[f64], _: &Params| vec![value; egrid.len() - 1];
    let generator = match kind {
        ModelKind::Additive => Generator::additive(func),
        ModelKind::Multiplicative => Generator::multiplicative(func),
        ModelKind::Convolution(_) => panic!("not a constant kind"),
    };
    Model::from_generator(name, name, Vec::<(String, Parameter)>::new(), generator).unwrap()
}

/// Norm convolution scaling the input flux by the operand's integrated flux
/// on a grid twice as wide.
fn renorm(name: &str) -> Model {
    Model::from_generator(
        name,
        name,
        Vec::<(String, Parameter)>::new(),
        Generator::norm_convolution(|_: &str| {
            |ff: &dyn Fn(&[f64]) -> Result<Vec<f64>, EvaluationError>,
             egrid: &[f64],
             flux: &[f64],
             _: &Params|
             -> Result<Vec<f64>, EvaluationError> {
                let wide: Vec<f64> = egrid.iter().map(|e| 2.0 * e).collect();
                let total: f64 = ff(&wide)?.iter().sum();
                Ok(flux.iter().map(|f| f * total).collect())
            }
        }),
    )
    .unwrap()
}

fn smooth(name: &str) -> Model {
    Model::from_generator(
        name,
        name,
        Vec::<(String, Parameter)>::new(),
        Generator::flux_convolution(|_: &str| {
            |_: &[f64], flux: &[f64], _: &Params| -> Vec<f64> { flux.iter().map(|f| 0.5 * f).collect() }
        }),
    )
    .unwrap()
}

#[test]
fn test_duplicate_leaves_are_disambiguated() {
    init();
    let space = LabelSpace::new((power_law() + power_law()).unwrap());
    assert_eq!(space.name(), "PowerLaw + PowerLaw2");
    assert_eq!(space.fmt(), r"\mathrm{PL} + \mathrm{PL}_2");

    let absorbed = (constant("PhAbs", ModelKind::Multiplicative, 0.5) * power_law()).unwrap();
    assert_eq!(LabelSpace::new(absorbed).name(), "PhAbs * PowerLaw");
}

#[rstest]
#[case(ModelKind::Additive, ModelKind::Additive)]
#[case(ModelKind::Multiplicative, ModelKind::Additive)]
#[case(ModelKind::Additive, ModelKind::Multiplicative)]
fn test_sum_and_product_rules(#[case] lh: ModelKind, #[case] rh: ModelKind) {
    let (a, b) = (constant("A", lh, 1.0), constant("B", rh, 2.0));
    let sum = &a + &b;
    let product = &a * &b;
    match (lh, rh) {
        (ModelKind::Additive, ModelKind::Additive) => {
            assert!(sum.is_ok());
            assert_eq!(product.unwrap_err().rejection(), Some(Rejection::AdditiveProduct));
        }
        _ => {
            assert!(matches!(sum, Err(CompositionError::IllegalKinds { .. })));
            assert_eq!(product.unwrap().kind(), ModelKind::Additive);
        }
    }
}

#[test]
fn test_norm_convolutions_do_not_nest() {
    let (n1, n2) = (renorm("N1"), renorm("N2"));
    for (lh, rh) in [(&n1, &n2), (&n2, &n1)] {
        let err = (lh * rh).unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::DoubleNormConvolution));
    }

    let chain = (&constant("M", ModelKind::Multiplicative, 2.0) * &n1).unwrap();
    assert!((&chain * &n2).is_err());
    assert!((&n2 * &chain).is_err());
    assert!((&(&smooth("S") * &n1).unwrap() * &n2).is_err());
}

#[test]
fn test_comps_count_shared_leaves() {
    let pl = power_law();
    let abs = constant("PhAbs", ModelKind::Multiplicative, 0.5);
    let tree = (&abs * &(&pl + &(&abs * &pl).unwrap()).unwrap()).unwrap();
    assert_eq!(tree.comps().len(), 4);

    let compiled = tree.compile().unwrap();
    assert_eq!(compiled.comps(), vec!["PhAbs", "PowerLaw", "PhAbs", "PowerLaw"]);
    assert_eq!(compiled.name(), "PhAbs * (PowerLaw + PhAbs * PowerLaw)");
}

#[rstest]
#[case(0.5, 2.0)]
#[case(-2.0, 0.25)]
#[case(1e3, -1e-3)]
fn test_parameter_defaults_compose(#[case] x: f64, #[case] y: f64) {
    let p = Parameter::uniform("p", "p", x, -1e4, 1e4).unwrap();
    let q = Parameter::fixed("q", "q", y).unwrap();
    assert_eq!((&p + &q).default_value(), x + y);
    assert_eq!((&p * &q).default_value(), x * y);
    assert!(p.set_default(2e4).is_err());
    assert_eq!(p.default_value(), x);
}

#[test]
fn test_mutation_after_rendering() {
    init();
    let (pl1, pl2, pl3) = (power_law(), power_law(), power_law());
    let tree = (&(&pl1 + &pl2).unwrap() + &pl3).unwrap();
    let space = LabelSpace::new(tree.clone());
    assert_eq!(space.fmt(), r"\mathrm{PL} + \mathrm{PL}_2 + \mathrm{PL}_3");

    let alpha = &pl2.leaf().unwrap().params()["alpha"];
    alpha.set_default(2.0).unwrap();
    pl2.set_fmt(r"\mathrm{BPL}").unwrap();
    assert_eq!(space.fmt(), r"\mathrm{PL} + \mathrm{BPL} + \mathrm{PL}_2");
    assert_eq!(space.name(), "PowerLaw + PowerLaw2 + PowerLaw3");

    let compiled = tree.compile().unwrap();
    assert_eq!(compiled.default_param_values()["PowerLaw2"]["alpha"], 2.0);
}

#[test]
fn test_norm_convolution_over_sum_matches_manual_threading() {
    init();
    let a = renorm("A");
    let (b, c) = (constant("B", ModelKind::Additive, 1.5), constant("C", ModelKind::Additive, 0.25));
    let bc = (&b + &c).unwrap();
    let tree = (&a * &bc).unwrap();

    let params = ParamValues::new();
    let egrid = [1.0, 2.0, 3.0, 5.0];
    let composite = tree.compile().unwrap().evaluate(&params, &egrid).unwrap();

    let a_eval = a.compile().unwrap();
    let bc_eval = bc.compile().unwrap();
    let (b_flux, c_flux) = (
        b.compile().unwrap().evaluate(&params, &egrid).unwrap(),
        c.compile().unwrap().evaluate(&params, &egrid).unwrap(),
    );
    let flux: Vec<f64> = b_flux.iter().zip(&c_flux).map(|(x, y)| x + y).collect();
    let manual = a_eval
        .evaluate_with(&params, &egrid, Some(flux.as_slice()), Some(bc_eval.evaluator() as &dyn FluxFn))
        .unwrap();

    assert_eq!(composite, manual);
    assert_eq!(composite, vec![1.75 * 5.25; 3]);
}

#[test]
fn test_convolution_labels() {
    let tree = (&smooth("gsmooth") * &power_law()).unwrap();
    let space = LabelSpace::new(tree);
    assert_eq!(space.label(LabelKind::Fmt), r"gsmooth * \mathrm{PL}");
    assert_eq!(space.name(), "gsmooth * PowerLaw");
}
