//! Criterion benchmarks for potato analysis.
//!
//! Each iteration builds a fresh potato so truncation, the transient passes
//! and kernel integration are all measured.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gsmp_core::model::{Actmc, ActmcRewards, Event, EventDistribution};
use gsmp_core::potato::Potato;

/// Birth-death chain on `0..n` leaking from the top state into `n`; the
/// timer fires every potato state into `n + 1`.
fn birth_death(n: usize, distribution: EventDistribution) -> Actmc {
    let mut m = Actmc::new(n + 2);
    for i in 0..n {
        if i + 1 < n {
            m.add_rate(i, i + 1, 2.0).unwrap();
        }
        if i > 0 {
            m.add_rate(i, i - 1, 1.0).unwrap();
        }
    }
    m.add_rate(n - 1, n, 0.5).unwrap();
    m.add_initial_state(0).unwrap();
    let mut e = Event::new("timer", distribution);
    for i in 0..n {
        e.add_to_probability(i, n + 1, 1.0);
    }
    m.add_event(e).unwrap();
    m
}

fn bench_mean_distribution(c: &mut Criterion) {
    let mut group = c.benchmark_group("mean_distribution");
    group.sample_size(20);

    let cases = [
        ("dirac", EventDistribution::Dirac { timeout: 1.5 }),
        ("erlang", EventDistribution::Erlang { rate: 2.0, phases: 3 }),
        ("weibull", EventDistribution::Weibull { scale: 1.0, shape: 2.0 }),
    ];
    for (name, distribution) in cases {
        for n in [3usize, 8] {
            let m = birth_death(n, distribution);
            group.bench_with_input(BenchmarkId::new(name, n), &m, |b, m| {
                b.iter(|| {
                    let mut potato = Potato::new(m, m.event("timer").unwrap());
                    potato.set_kappa(1e-10).unwrap();
                    black_box(potato.mean_distribution(0).unwrap().len())
                });
            });
        }
    }

    group.finish();
}

fn bench_rewards(c: &mut Criterion) {
    let mut group = c.benchmark_group("mean_reward");
    group.sample_size(20);

    let m = birth_death(5, EventDistribution::Dirac { timeout: 1.0 });
    let mut rewards = ActmcRewards::new();
    for s in 0..5 {
        rewards.set_state_reward(s, s as f64 + 1.0);
        rewards.set_event_reward("timer", s, 2.0);
    }
    group.bench_function("dirac_5", |b| {
        b.iter(|| {
            let mut potato = Potato::new(&m, m.event("timer").unwrap()).with_rewards(&rewards);
            potato.set_kappa(1e-10).unwrap();
            black_box(potato.mean_reward(0).unwrap().clone())
        });
    });

    group.finish();
}

fn bench_reevaluation(c: &mut Criterion) {
    let m = birth_death(5, EventDistribution::Dirac { timeout: 1.0 });
    let mut potato = Potato::new(&m, m.event("timer").unwrap());
    potato.set_kappa(1e-12).unwrap();
    potato.mean_distribution(0).unwrap();

    c.bench_function("reevaluate_dirac", |b| {
        b.iter(|| black_box(potato.reevaluate_dirac(0, black_box(0.75)).unwrap()));
    });
}

criterion_group!(benches, bench_mean_distribution, bench_rewards, bench_reevaluation);
criterion_main!(benches);
