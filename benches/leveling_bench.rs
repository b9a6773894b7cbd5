use criterion::{black_box, criterion_group, criterion_main, Criterion};
use praxisd::gamification::badges::{self, StatSnapshot};
use praxisd::gamification::curve::LevelCurve;
use praxisd::gamification::level;

fn bench_resolve(c: &mut Criterion) {
    let linear = LevelCurve::linear(100);
    c.bench_function("resolve_linear_high_xp", |b| {
        b.iter(|| level::resolve(black_box(&linear), black_box(5_000_000)))
    });

    let table = LevelCurve::from_table((0u64..100).map(|i| i * i * 50).collect()).unwrap();
    c.bench_function("resolve_table_mid_xp", |b| {
        b.iter(|| level::resolve(black_box(&table), black_box(120_000)))
    });
}

fn bench_badges(c: &mut Criterion) {
    let snapshot = StatSnapshot {
        experience: 12_000,
        level: 14,
        streak: 9,
        completed_scenarios: 40,
    };
    c.bench_function("evaluate_badge_catalog", |b| {
        b.iter(|| badges::evaluate(black_box(&snapshot)))
    });
}

criterion_group!(benches, bench_resolve, bench_badges);
criterion_main!(benches);
