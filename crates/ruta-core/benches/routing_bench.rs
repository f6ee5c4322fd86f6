//! Criterion benchmarks for the routing pass (`ruta-core::router`).
//!
//! Measures `make_routing()` with no backend attached, so only the engine's own
//! bookkeeping is timed. Two axes:
//!
//! - **Steady**: a pass over unchanged state (nothing to implement)
//! - **Churn**: a pass after the best device toggled availability (every stream moves)
//!
//! Run with: `cargo bench -p ruta-core -- routing/`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ruta_core::{Direction, NodeClass, NodeIndex, NodeSpec, Router, RouterConfig};

const POPULATIONS: &[usize] = &[8, 32, 128, 512];

/// Builds a router with `streams` player streams and a quarter as many devices.
fn populated(streams: usize) -> (Router, NodeIndex) {
    let mut router = Router::new(RouterConfig::default()).unwrap();
    let devices = (streams / 4).max(2);
    let mut best = None;
    for i in 0..devices {
        let index = router
            .register_node(
                NodeSpec::device(format!("dev{i}"), Direction::Output)
                    .with_priority(i32::try_from(i).unwrap_or(i32::MAX)),
            )
            .unwrap();
        best = Some(index);
    }
    for i in 0..streams {
        router
            .register_node(
                NodeSpec::stream(format!("stream{i}"), Direction::Input)
                    .with_class(NodeClass::Player),
            )
            .unwrap();
    }
    router.make_routing();
    (router, best.unwrap())
}

fn bench_steady(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing/steady");
    for &streams in POPULATIONS {
        let (mut router, _) = populated(streams);
        group.bench_with_input(BenchmarkId::from_parameter(streams), &streams, |b, _| {
            b.iter(|| black_box(router.make_routing()));
        });
    }
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing/churn");
    for &streams in POPULATIONS {
        let (mut router, best) = populated(streams);
        let mut available = true;
        group.bench_with_input(BenchmarkId::from_parameter(streams), &streams, |b, _| {
            b.iter(|| {
                available = !available;
                router.set_available(best, available).unwrap();
                black_box(router.make_routing())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_steady, bench_churn);
criterion_main!(benches);
