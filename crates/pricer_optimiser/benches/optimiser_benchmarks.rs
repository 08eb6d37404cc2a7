//! Benchmarks for pricer_optimiser.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pricer_core::market_data::curves::{Curve, YieldCurve};
use pricer_core::types::{AdOrder, VariableSpace};
use pricer_optimiser::calibration::{
    Algorithm, CalibrationInstrument, ParSwapQuote, Solver, SolverConfig,
};
use pricer_optimiser::graph::CurveGraph;
use pricer_optimiser::risk::RiskLadder;

/// Flat-start OIS graph with annual nodes out to `count` years.
fn ois_graph(count: usize) -> CurveGraph {
    let mut space = VariableSpace::new();
    let nodes = (0..=count).map(|i| (i as f64, 1.0));
    let curve = Curve::builder("ois").nodes(nodes).build(&mut space).unwrap();
    let mut graph = CurveGraph::new();
    graph.add_curve(curve, &[]).unwrap();
    graph
}

/// Annual par swaps with an upward sloping term structure.
fn generate_swaps(count: usize) -> Vec<Box<dyn CalibrationInstrument>> {
    (1..=count)
        .map(|i| {
            let tenor = i as f64;
            let rate = 0.03 + tenor * 0.0005;
            Box::new(ParSwapQuote::new("ois", tenor, rate)) as Box<dyn CalibrationInstrument>
        })
        .collect()
}

fn benchmark_calibration_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibrate_ois");
    let solver = Solver::with_defaults();

    for size in [5, 10, 20, 30] {
        let swaps = generate_swaps(size);
        let template = ois_graph(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &swaps, |b, swaps| {
            b.iter(|| {
                let mut graph = template.clone();
                solver.calibrate(&mut graph, black_box(swaps))
            })
        });
    }

    group.finish();
}

fn benchmark_algorithms(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibrate_algorithm");
    let swaps = generate_swaps(10);
    let template = ois_graph(10);

    for algorithm in [Algorithm::GaussNewton, Algorithm::LevenbergMarquardt] {
        let solver = Solver::new(SolverConfig::default().with_algorithm(algorithm));
        group.bench_with_input(
            BenchmarkId::from_parameter(algorithm),
            &swaps,
            |b, swaps| {
                b.iter(|| {
                    let mut graph = template.clone();
                    solver.calibrate(&mut graph, black_box(swaps))
                })
            },
        );
    }

    group.finish();
}

fn benchmark_quote_delta(c: &mut Criterion) {
    let swaps = generate_swaps(20);
    let mut graph = ois_graph(20);
    let calibration = Solver::with_defaults()
        .calibrate(&mut graph, &swaps)
        .unwrap();
    let ladder = RiskLadder::new().with(calibration);
    let ois = graph.curve("ois").unwrap();

    c.bench_function("quote_delta_20", |b| {
        b.iter(|| {
            let price = ois.zero_rate(black_box(12.5)).unwrap();
            ladder.delta(&price)
        })
    });
}

fn benchmark_quote_gamma(c: &mut Criterion) {
    let swaps = generate_swaps(10);
    let mut graph = ois_graph(10);
    let calibration = Solver::new(SolverConfig::default().with_ad_order(AdOrder::Second))
        .calibrate(&mut graph, &swaps)
        .unwrap();
    let ladder = RiskLadder::new().with(calibration);
    let ois = graph.curve("ois").unwrap();

    c.bench_function("quote_gamma_10", |b| {
        b.iter(|| {
            let price = ois.discount_factor(black_box(6.5)).unwrap();
            ladder.gamma(&price)
        })
    });
}

criterion_group!(
    benches,
    benchmark_calibration_size,
    benchmark_algorithms,
    benchmark_quote_delta,
    benchmark_quote_gamma
);
criterion_main!(benches);
