//! Benchmarks for the collapse engine.
//!
//! Run with: cargo bench

use collapse_engine::{
    early_warning::{DetectorConfig, EarlyWarningDetector},
    harmony_state, CascadeParameters, CascadeSimulator, HarmonyState, IntegrationMethod,
    ShockWindow, TRUST_THRESHOLD,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn initial_state() -> HarmonyState {
    harmony_state(&[0.7, 0.7, 0.6, 0.65, 0.6, 0.65, 0.75]).unwrap()
}

fn generate_series(n: usize, seed: u64) -> Vec<f64> {
    // Declining trend plus deterministic pseudo-random noise
    let mut x = seed;
    (0..n)
        .map(|i| {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            let noise = (x as f64) / (u64::MAX as f64) - 0.5;
            0.7 - 0.5 * i as f64 / n as f64 + 0.05 * noise
        })
        .collect()
}

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate");
    let simulator = CascadeSimulator::new(CascadeParameters::default());
    let h0 = initial_state();

    for method in [IntegrationMethod::Rk45, IntegrationMethod::Rk23] {
        for horizon in [50.0, 200.0] {
            group.bench_with_input(
                BenchmarkId::new(method.as_str(), horizon),
                &horizon,
                |b, &horizon| {
                    b.iter(|| simulator.simulate(black_box(&h0), (0.0, horizon), None, method))
                },
            );
        }
    }

    group.finish();
}

fn bench_simulate_with_shock(c: &mut Criterion) {
    let simulator = CascadeSimulator::new(CascadeParameters::default());
    let h0 = initial_state();

    c.bench_function("simulate_with_shock", |b| {
        b.iter(|| {
            simulator.simulate_with_shock(
                black_box(&h0),
                (0.0, 100.0),
                ShockWindow::new(20.0, black_box(0.8)),
            )
        })
    });
}

fn bench_threshold_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_collapse_threshold");
    group.sample_size(10);
    let simulator = CascadeSimulator::new(CascadeParameters::default());
    let h0 = initial_state();

    for samples in [8usize, 32].iter() {
        group.throughput(Throughput::Elements(*samples as u64));
        group.bench_with_input(BenchmarkId::from_parameter(samples), samples, |b, &n| {
            b.iter(|| simulator.find_collapse_threshold(black_box(&h0), (0.0, 2.0), n, 0.3))
        });
    }

    group.finish();
}

fn bench_csi(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_csi");
    let detector = EarlyWarningDetector::new(DetectorConfig::with_window(20)).unwrap();

    for size in [100, 1000, 10000].iter() {
        let series = generate_series(*size, 42);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| detector.compute_csi(black_box(&series), TRUST_THRESHOLD))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_simulate,
    bench_simulate_with_shock,
    bench_threshold_sweep,
    bench_csi,
);
criterion_main!(benches);
