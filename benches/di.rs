use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_registry::*;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ===== Micro Benchmarks =====

fn bench_cached_get(c: &mut Criterion) {
    let rt = runtime();
    let container = Container::new();
    container.set_value("", 42u64).unwrap();
    let ctx = Context::background();

    // Prime the entry
    rt.block_on(container.get::<u64>(&ctx, "")).unwrap();

    c.bench_function("cached_get_u64", |b| {
        b.iter(|| {
            let v = rt.block_on(container.get::<u64>(&ctx, "")).unwrap();
            black_box(v);
        })
    });
}

fn bench_cold_build(c: &mut Criterion) {
    struct ExpensiveToCreate {
        data: Vec<u64>,
    }

    let rt = runtime();
    c.bench_function("cold_build_expensive", |b| {
        b.iter_batched(
            || {
                let container = Container::new();
                container
                    .set::<ExpensiveToCreate, _, _>("", |_ctx, _ctn| async {
                        Ok(Built::new(ExpensiveToCreate {
                            data: (0..1000).collect(),
                        }))
                    })
                    .unwrap();
                container
            },
            |container| {
                let v = rt
                    .block_on(container.get::<ExpensiveToCreate>(&Context::background(), ""))
                    .unwrap();
                black_box(v.data.len());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_dependency_chain(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("dependency_chain");

    for depth in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::new("build_and_close", depth), &depth, |b, &depth| {
            let container = Container::new();
            container.set_value("0", 0usize).unwrap();
            for level in 1..=depth {
                let below = (level - 1).to_string();
                container
                    .set::<usize, _, _>(level.to_string(), move |ctx, ctn| {
                        let below = below.clone();
                        async move {
                            let value = ctn.get::<usize>(&ctx, &below).await?;
                            Ok(Built::new(*value + 1))
                        }
                    })
                    .unwrap();
            }
            let top = depth.to_string();
            let ctx = Context::background();

            b.iter(|| {
                rt.block_on(async {
                    let v = container.get::<usize>(&ctx, &top).await.unwrap();
                    black_box(*v);
                    container.close(&ctx).await.unwrap();
                })
            })
        });
    }
    group.finish();
}

fn bench_get_all_scaling(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("get_all");

    for count in [1usize, 16, 128] {
        let container = Container::new();
        for i in 0..count {
            container.set_value(format!("s{i:04}"), i).unwrap();
        }
        let ctx = Context::background();
        rt.block_on(container.get_all::<usize>(&ctx)).unwrap();

        group.bench_with_input(BenchmarkId::new("cached", count), &count, |b, _| {
            b.iter(|| {
                let all = rt.block_on(container.get_all::<usize>(&ctx)).unwrap();
                black_box(all.len());
            })
        });
    }
    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("contention");

    for tasks in [4usize, 32] {
        group.bench_with_input(BenchmarkId::new("first_build", tasks), &tasks, |b, &tasks| {
            b.iter_batched(
                || {
                    let container = Container::new();
                    container.set_value("", Arc::new([0u8; 64])).unwrap();
                    container
                },
                |container| {
                    rt.block_on(async {
                        let handles: Vec<_> = (0..tasks)
                            .map(|_| {
                                let container = container.clone();
                                tokio::spawn(async move {
                                    container
                                        .get::<Arc<[u8; 64]>>(&Context::background(), "")
                                        .await
                                        .unwrap()
                                })
                            })
                            .collect();
                        for handle in handles {
                            black_box(handle.await.unwrap());
                        }
                    })
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_cached_get,
    bench_cold_build,
    bench_dependency_chain,
    bench_get_all_scaling,
    bench_contention
);
criterion_main!(benches);
