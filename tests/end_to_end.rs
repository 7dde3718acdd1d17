//! End-to-end scenarios: model in, cut sets and probabilities out.
//!
//! The trees are small enough to check against hand-computed results.

use fta_rs::analysis::{FaultTreeAnalysis, RiskAnalysis};
use fta_rs::model::{BasicEvent, Distribution, FaultTree, Formula, FormulaArg, Gate};
use fta_rs::node::GateType;
use fta_rs::settings::{Approximation, Settings};

const EPS: f64 = 1e-12;

fn args(names: &[&str]) -> Vec<FormulaArg> {
    names.iter().map(|n| FormulaArg::basic(n)).collect()
}

fn model(events: &[(&str, f64)], gates: Vec<(&str, Formula)>, top: &str) -> FaultTree {
    let mut ft = FaultTree::new("scenario");
    for (id, p) in events {
        ft.add_basic_event(BasicEvent::new(id, *p).unwrap()).unwrap();
    }
    for (id, formula) in gates {
        ft.add_gate(Gate::new(id, formula)).unwrap();
    }
    ft.set_top_event(top).unwrap();
    ft
}

fn mcs_strings(analysis: &RiskAnalysis) -> Vec<String> {
    analysis
        .fta
        .as_ref()
        .unwrap()
        .mcs
        .iter()
        .map(|set| set.to_string())
        .collect()
}

fn run(ft: &FaultTree, settings: Settings) -> RiskAnalysis {
    let mut analysis = RiskAnalysis::new(settings);
    analysis.analyze(ft).unwrap();
    analysis
}

// ─── Concrete scenarios ────────────────────────────────────────────────────────

#[test]
fn and_of_two_events() {
    let ft = model(
        &[("a", 0.1), ("b", 0.2)],
        vec![("top", Formula::new(GateType::And, args(&["a", "b"])).unwrap())],
        "top",
    );
    for approx in [
        Approximation::Default,
        Approximation::RareEvent,
        Approximation::Mcub,
    ] {
        let analysis = run(
            &ft,
            Settings::default()
                .probability_analysis(true)
                .approximation(approx),
        );
        assert_eq!(mcs_strings(&analysis), vec!["{a, b}"]);
        let p = analysis.prob.as_ref().unwrap().p_total;
        assert!((p - 0.02).abs() < EPS, "{:?}: {}", approx, p);
    }
}

#[test]
fn or_of_two_events() {
    let ft = model(
        &[("a", 0.1), ("b", 0.1)],
        vec![("top", Formula::new(GateType::Or, args(&["a", "b"])).unwrap())],
        "top",
    );
    let base = Settings::default()
        .probability_analysis(true)
        .cut_off(0.0)
        .unwrap();

    let rare = run(&ft, base.clone().approximation(Approximation::RareEvent));
    assert_eq!(mcs_strings(&rare), vec!["{a}", "{b}"]);
    assert!((rare.prob.as_ref().unwrap().p_total - 0.2).abs() < EPS);

    let mcub = run(&ft, base.clone().approximation(Approximation::Mcub));
    assert!((mcub.prob.as_ref().unwrap().p_total - 0.19).abs() < EPS);

    let series = run(&ft, base.num_sums(2).unwrap());
    assert!((series.prob.as_ref().unwrap().p_total - 0.19).abs() < EPS);
}

#[test]
fn shared_event_between_two_ands() {
    let ft = model(
        &[("a", 0.1), ("b", 0.1), ("c", 0.1)],
        vec![
            ("g1", Formula::new(GateType::And, args(&["a", "b"])).unwrap()),
            ("g2", Formula::new(GateType::And, args(&["a", "c"])).unwrap()),
            (
                "top",
                Formula::new(
                    GateType::Or,
                    vec![FormulaArg::gate("g1"), FormulaArg::gate("g2")],
                )
                .unwrap(),
            ),
        ],
        "top",
    );
    let base = Settings::default()
        .probability_analysis(true)
        .cut_off(0.0)
        .unwrap();

    let rare = run(&ft, base.clone().approximation(Approximation::RareEvent));
    assert_eq!(mcs_strings(&rare), vec!["{a, b}", "{a, c}"]);
    assert!((rare.prob.as_ref().unwrap().p_total - 0.02).abs() < EPS);

    let mcub = run(&ft, base.clone().approximation(Approximation::Mcub));
    assert!((mcub.prob.as_ref().unwrap().p_total - 0.0396).abs() < EPS);

    let series = run(&ft, base.num_sums(2).unwrap());
    assert!((series.prob.as_ref().unwrap().p_total - 0.019).abs() < EPS);
}

#[test]
fn xor_keeps_complement_literals() {
    let ft = model(
        &[("a", 0.5), ("b", 0.5)],
        vec![("top", Formula::new(GateType::Xor, args(&["a", "b"])).unwrap())],
        "top",
    );
    let analysis = run(
        &ft,
        Settings::default().probability_analysis(true).cut_off(0.0).unwrap(),
    );
    assert_eq!(mcs_strings(&analysis), vec!["{a, not b}", "{not a, b}"]);
    assert!((analysis.prob.as_ref().unwrap().p_total - 0.5).abs() < EPS);
}

#[test]
fn unity_tree_yields_empty_cut_set() {
    // not-a = NOT(a); top = OR(a, not-a) is guaranteed failure.
    let ft = model(
        &[("a", 0.3)],
        vec![
            ("not-a", Formula::new(GateType::Not, vec![FormulaArg::basic("a")]).unwrap()),
            (
                "top",
                Formula::new(
                    GateType::Or,
                    vec![FormulaArg::basic("a"), FormulaArg::gate("not-a")],
                )
                .unwrap(),
            ),
        ],
        "top",
    );
    let analysis = run(
        &ft,
        Settings::default()
            .probability_analysis(true)
            .uncertainty_analysis(true)
            .num_trials(50)
            .unwrap(),
    );
    let fta = analysis.fta.as_ref().unwrap();
    assert_eq!(fta.mcs.len(), 1);
    assert!(fta.mcs[0].literals.is_empty());
    assert_eq!(fta.max_order, 0);

    assert!((analysis.prob.as_ref().unwrap().p_total - 1.0).abs() < EPS);

    let uncertainty = analysis.uncertainty.as_ref().unwrap();
    assert_eq!(uncertainty.mean, 1.0);
    assert_eq!(uncertainty.sigma, 0.0);
    assert_eq!(uncertainty.confidence_interval, (1.0, 1.0));
    assert!(uncertainty.quantiles.iter().all(|&q| q == 1.0));
    assert!(uncertainty.warnings.iter().any(|w| w.contains("UNITY")));
}

#[test]
fn null_tree_yields_no_cut_sets() {
    // top = AND(a, NOT(a)) can never fail.
    let not_a = Formula::new(GateType::Not, vec![FormulaArg::basic("a")]).unwrap();
    let ft = model(
        &[("a", 0.3)],
        vec![(
            "top",
            Formula::new(
                GateType::And,
                vec![FormulaArg::basic("a"), FormulaArg::formula(not_a)],
            )
            .unwrap(),
        )],
        "top",
    );
    let analysis = run(&ft, Settings::default().probability_analysis(true));
    assert!(analysis.fta.as_ref().unwrap().mcs.is_empty());
    assert_eq!(analysis.prob.as_ref().unwrap().p_total, 0.0);
}

#[test]
fn atleast_gate_probability() {
    // 2-of-3 with p = 0.1: P = 3 * p^2 - 2 * p^3 exactly.
    let ft = model(
        &[("a", 0.1), ("b", 0.1), ("c", 0.1)],
        vec![("top", Formula::atleast(2, args(&["a", "b", "c"])).unwrap())],
        "top",
    );
    let analysis = run(
        &ft,
        Settings::default()
            .probability_analysis(true)
            .cut_off(0.0)
            .unwrap()
            .num_sums(5)
            .unwrap(),
    );
    assert_eq!(analysis.fta.as_ref().unwrap().mcs.len(), 3);
    let expected = 3.0 * 0.01 - 2.0 * 0.001;
    assert!((analysis.prob.as_ref().unwrap().p_total - expected).abs() < EPS);
}

// ─── Properties ────────────────────────────────────────────────────────────────

#[test]
fn mcs_invariants_on_layered_tree() {
    // Three redundant trains, each a 2-of-3 over its own sensors, with one
    // sensor shared across all trains.
    let mut events: Vec<(String, f64)> = vec![("shared".to_string(), 0.02)];
    let mut gates = Vec::new();
    for train in 0..3 {
        for sensor in 0..2 {
            events.push((format!("s{}-{}", train, sensor), 0.05));
        }
        let formula = Formula::atleast(
            2,
            vec![
                FormulaArg::basic(&format!("s{}-0", train)),
                FormulaArg::basic(&format!("s{}-1", train)),
                FormulaArg::basic("shared"),
            ],
        )
        .unwrap();
        gates.push((format!("train{}", train), formula));
    }
    let top = Formula::new(
        GateType::And,
        (0..3)
            .map(|i| FormulaArg::gate(&format!("train{}", i)))
            .collect(),
    )
    .unwrap();

    let mut ft = FaultTree::new("layered");
    for (id, p) in &events {
        ft.add_basic_event(BasicEvent::new(id, *p).unwrap()).unwrap();
    }
    for (id, formula) in gates {
        ft.add_gate(Gate::new(&id, formula)).unwrap();
    }
    ft.add_gate(Gate::new("top", top)).unwrap();
    ft.set_top_event("top").unwrap();

    let limit_order = 4;
    let settings = Settings::default().limit_order(limit_order).unwrap();
    let (result, collection) = FaultTreeAnalysis::new(settings).analyze(&ft).unwrap();

    assert!(!collection.sets.is_empty());
    for (i, set) in collection.sets.iter().enumerate() {
        // Order bound.
        assert!(set.order() <= limit_order);
        // No literal together with its complement.
        for pair in set.literals().windows(2) {
            assert_ne!(pair[0].var(), pair[1].var());
        }
        // Antichain: no set contains another.
        for (j, other) in collection.sets.iter().enumerate() {
            if i != j {
                assert!(!set.is_subset_of(other), "{} inside {}", set, other);
            }
        }
    }
    assert_eq!(result.mcs.len(), collection.sets.len());
    assert!(result.max_order <= limit_order);
    // The shared sensor plus one own sensor per train is the only shape
    // within the order limit: 2 * 2 * 2 combinations.
    assert_eq!(result.mcs.len(), 8);
    assert!(result
        .mcs
        .iter()
        .any(|s| s.to_string() == "{s0-0, s1-0, s2-0, shared}"));
}

#[test]
fn approximation_ordering_holds() {
    let ft = model(
        &[("a", 0.2), ("b", 0.3), ("c", 0.25)],
        vec![("top", Formula::new(GateType::Or, args(&["a", "b", "c"])).unwrap())],
        "top",
    );
    let base = Settings::default()
        .probability_analysis(true)
        .cut_off(0.0)
        .unwrap()
        .num_sums(3)
        .unwrap();
    let rare = run(&ft, base.clone().approximation(Approximation::RareEvent))
        .prob
        .unwrap()
        .p_total;
    let mcub = run(&ft, base.clone().approximation(Approximation::Mcub))
        .prob
        .unwrap()
        .p_total;
    let exact = run(&ft, base).prob.unwrap().p_total;
    assert!(rare >= mcub - EPS);
    assert!(mcub >= exact - EPS);
    assert!((exact - (1.0 - 0.8 * 0.7 * 0.75)).abs() < EPS);
}

#[test]
fn double_complement_round_trip() {
    // NOT(NOT(f)) must reproduce the cut sets of f exactly.
    let inner = Formula::new(
        GateType::Or,
        vec![
            FormulaArg::formula(Formula::new(GateType::And, args(&["a", "b"])).unwrap()),
            FormulaArg::basic("c"),
        ],
    )
    .unwrap();
    let ft_plain = model(
        &[("a", 0.1), ("b", 0.2), ("c", 0.3)],
        vec![("top", inner.clone())],
        "top",
    );
    let ft_wrapped = model(
        &[("a", 0.1), ("b", 0.2), ("c", 0.3)],
        vec![
            ("f", inner),
            (
                "not-f",
                Formula::new(GateType::Not, vec![FormulaArg::gate("f")]).unwrap(),
            ),
            (
                "top",
                Formula::new(GateType::Not, vec![FormulaArg::gate("not-f")]).unwrap(),
            ),
        ],
        "top",
    );
    let plain = run(&ft_plain, Settings::default());
    let wrapped = run(&ft_wrapped, Settings::default());
    assert_eq!(mcs_strings(&plain), mcs_strings(&wrapped));
}

#[test]
fn complemented_literals_flip_signs() {
    // XOR is invariant under complementing both inputs; complementing the
    // top then flips each reported literal.
    let ft = model(
        &[("a", 0.5), ("b", 0.5)],
        vec![
            (
                "x",
                Formula::new(
                    GateType::Xor,
                    vec![
                        FormulaArg::formula(
                            Formula::new(GateType::Not, vec![FormulaArg::basic("a")]).unwrap(),
                        ),
                        FormulaArg::formula(
                            Formula::new(GateType::Not, vec![FormulaArg::basic("b")]).unwrap(),
                        ),
                    ],
                )
                .unwrap(),
            ),
            (
                "top",
                Formula::new(GateType::Not, vec![FormulaArg::gate("x")]).unwrap(),
            ),
        ],
        "top",
    );
    let analysis = run(&ft, Settings::default());
    // NOT(XOR(~a, ~b)) = NOT(XOR(a, b)): both agree or both disagree.
    assert_eq!(mcs_strings(&analysis), vec!["{a, b}", "{not a, not b}"]);
}

#[test]
fn uncertainty_is_deterministic_end_to_end() {
    let mut ft = FaultTree::new("uncertain");
    ft.add_basic_event(
        BasicEvent::new("valve", 0.1)
            .unwrap()
            .with_distribution(Distribution::LogNormal { mean: -2.5, sigma: 0.4 })
            .unwrap(),
    )
    .unwrap();
    ft.add_basic_event(
        BasicEvent::new("relay", 0.05)
            .unwrap()
            .with_distribution(Distribution::Beta { alpha: 2.0, beta: 30.0 })
            .unwrap(),
    )
    .unwrap();
    ft.add_gate(Gate::new(
        "top",
        Formula::new(GateType::Or, args(&["valve", "relay"])).unwrap(),
    ))
    .unwrap();
    ft.set_top_event("top").unwrap();

    let settings = Settings::default()
        .uncertainty_analysis(true)
        .num_trials(500)
        .unwrap()
        .seed(2024);
    let first = run(&ft, settings.clone()).uncertainty.unwrap();
    let second = run(&ft, settings).uncertainty.unwrap();
    assert_eq!(first.mean, second.mean);
    assert_eq!(first.sigma, second.sigma);
    assert_eq!(first.confidence_interval, second.confidence_interval);
    assert_eq!(first.quantiles, second.quantiles);
    assert!(first.mean > 0.0 && first.mean < 1.0);
}

#[test]
fn monte_carlo_matches_point_probability_for_constant_events() {
    let ft = model(
        &[("a", 0.1), ("b", 0.2)],
        vec![("top", Formula::new(GateType::Or, args(&["a", "b"])).unwrap())],
        "top",
    );
    let analysis = run(
        &ft,
        Settings::default()
            .probability_analysis(true)
            .uncertainty_analysis(true)
            .cut_off(0.0)
            .unwrap()
            .num_trials(100)
            .unwrap(),
    );
    let p_total = analysis.prob.as_ref().unwrap().p_total;
    let uncertainty = analysis.uncertainty.as_ref().unwrap();
    assert!((uncertainty.mean - p_total).abs() < EPS);
    assert_eq!(uncertainty.sigma, 0.0);
}
