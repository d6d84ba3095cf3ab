use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sched_stats::aggregation::{collapse, fold_experiments};
use sched_stats::config::ParseConfig;
use sched_stats::experiment::Experiment;
use sched_stats::test_helpers::ExperimentDir;

const NODES: &str = r#"{"id": 0, "cost": 0, "period": 1, "level": 2, "children": [
    {"id": 1, "cost": 0, "period": 1, "level": 1, "children": [
        {"id": 2, "cost": 1, "period": 4, "level": 0},
        {"id": 3, "cost": 3, "period": 8, "level": 0}
    ]},
    {"id": 4, "cost": 1, "period": 2, "level": 0}
]}"#;

/// Half RUN, half QPS runs spread over four caps.
fn prep_runs(runs: usize) -> Vec<ExperimentDir> {
    (0..runs)
        .map(|i| {
            let cap = format!("0.{}", 5 + i % 4);
            if i % 2 == 0 {
                ExperimentDir::run(2, "1", &cap)
                    .with_tasks(3)
                    .with_nodes(NODES)
            } else {
                ExperimentDir::qps(8, "1", &cap)
                    .with_tasks(9)
                    .with_masters("1 0 0\n2 0 1\n5 0 4\n")
            }
        })
        .collect()
}

fn fold_and_collapse(c: &mut Criterion) {
    let conf = ParseConfig::default();
    let mut group = c.benchmark_group("fold_and_collapse");
    for runs in [4, 16, 64] {
        let dirs = prep_runs(runs);
        let experiments = dirs
            .iter()
            .map(|d| Experiment::load(d.path(), &conf).expect("invalid experiment"))
            .collect::<Vec<_>>();
        group.bench_with_input(BenchmarkId::new("runs", runs), &experiments, |b, exps| {
            b.iter(|| {
                let rows = fold_experiments(black_box(exps)).expect("fold failed");
                collapse(&rows).expect("collapse failed")
            });
        });
    }
    group.finish();
}

criterion_group!(benches, fold_and_collapse);
criterion_main!(benches);
