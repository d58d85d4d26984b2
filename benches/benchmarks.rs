//! Benchmark suite for tickwatch hot paths.
//!
//! - Status report parsing
//! - Cycle planning (detector + orchestrator)
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tickwatch::{CycleInput, LoopState, NodeEndpoint, RecoveryOrchestrator, StallDetector, StatusParser, TickSnapshot};

// ============================================================================
// Parsing Benchmarks
// ============================================================================

/// Build a status report padded with `noise` unrecognized lines.
fn noisy_report(noise: usize) -> String {
    let mut text = String::new();
    for i in 0..noise {
        text.push_str(&format!("Peer {i}: 10.0.{}.{} connected\n", i / 256, i % 256));
    }
    text.push_str("Tick: 15200431\nEpoch: 142\nInitial tick: 15190000\n");
    text
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("status_parse");
    let parser = StatusParser::new().unwrap();

    for noise in [0, 32, 512] {
        let report = noisy_report(noise);
        group.throughput(Throughput::Bytes(report.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", noise), &report, |b, report| {
            b.iter(|| black_box(parser.parse(black_box(report))))
        });
    }

    group.finish();
}

// ============================================================================
// Planning Benchmarks
// ============================================================================

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_plan");
    let detector = StallDetector::new();

    for nodes in [1, 8, 64] {
        let endpoints: Vec<_> = (0..nodes)
            .map(|i| NodeEndpoint::new(format!("10.0.0.{i}"), 31841))
            .collect();
        let orchestrator =
            RecoveryOrchestrator::new(endpoints, 1000, ["MAIN".to_string(), "MAIN".to_string()]);
        let snapshot = TickSnapshot::new(960, 1, 0);
        let state = LoopState {
            previous_snapshot: Some(snapshot),
            consecutive_unchanged_count: 3,
            last_cycle_fired_escalation: true,
            last_cycle_fired_reissue: true,
        };

        group.bench_with_input(BenchmarkId::new("stalled", nodes), &state, |b, state| {
            b.iter(|| {
                let observation = detector.observe(CycleInput::Snapshot(snapshot), state);
                black_box(orchestrator.plan(&observation, state))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_plan);
criterion_main!(benches);
