use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiercache_core::{CacheContext, CacheTier, Schema};

fn schema() -> Schema {
    Schema::builder()
        .entry("ui.theme", "String", json!("system"))
        .entry("ocr/provider/${id}", "bool", json!(false))
        .entry("kb/${base}/doc/${doc}", "u32", json!(0))
        .build()
}

fn context() -> Arc<CacheContext> {
    CacheContext::builder().schema(schema()).start_ready().build()
}

fn bench_set_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_sequential");

    for size in [10, 100, 1000].iter() {
        let ctx = context();
        let keys: Vec<String> = (0..*size).map(|i| format!("key{}", i)).collect();

        group.bench_with_input(BenchmarkId::new("local", size), &keys, |b, keys| {
            b.iter(|| {
                for (i, key) in keys.iter().enumerate() {
                    ctx.local().set_casual(key, i as u32, None);
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("local_ttl", size), &keys, |b, keys| {
            b.iter(|| {
                for (i, key) in keys.iter().enumerate() {
                    ctx.local()
                        .set_casual(key, i as u32, Some(Duration::from_secs(60)));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("broadcast", size), &keys, |b, keys| {
            b.iter(|| {
                for (i, key) in keys.iter().enumerate() {
                    ctx.broadcast().set_casual(key, i as u32, None);
                }
            });
        });
    }

    group.finish();
}

fn bench_get_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_sequential");

    for size in [10, 100, 1000].iter() {
        // Pre-populate cache
        let ctx = context();
        let keys: Vec<String> = (0..*size).map(|i| format!("key{}", i)).collect();
        for (i, key) in keys.iter().enumerate() {
            ctx.local().set_casual(key, i as u32, None);
        }

        group.bench_with_input(BenchmarkId::new("hit", size), &keys, |b, keys| {
            b.iter(|| {
                for key in keys {
                    black_box(ctx.local().get_casual::<u32>(key));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("miss", size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    black_box(ctx.local().get_casual::<u32>(&format!("absent{}", i)));
                }
            });
        });
    }

    group.finish();
}

fn bench_template_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("template_resolution");
    let ctx = context();

    group.bench_function("exact", |b| {
        b.iter(|| black_box(ctx.local().get_casual::<String>("ui.theme")));
    });

    group.bench_function("single_placeholder", |b| {
        b.iter(|| black_box(ctx.local().get_casual::<bool>("ocr/provider/system")));
    });

    group.bench_function("two_placeholders", |b| {
        b.iter(|| black_box(ctx.local().get_casual::<u32>("kb/main/doc/intro")));
    });

    group.bench_function("no_match", |b| {
        b.iter(|| black_box(ctx.local().get_casual::<u32>("scratch/unknown/key")));
    });

    group.finish();
}

fn bench_notify(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify");

    for subscribers in [0, 1, 16].iter() {
        let ctx = context();
        let _subs: Vec<_> = (0..*subscribers)
            .map(|_| ctx.local().subscribe("ui.theme", || {}))
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            subscribers,
            |b, _| {
                b.iter(|| ctx.local().set_casual("ui.theme", "dark", None));
            },
        );
    }

    group.finish();
}

fn bench_concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_reads");

    for num_threads in [2, 4, 8].iter() {
        // Pre-populate cache
        let ctx = context();
        for i in 0..100 {
            ctx.local().set_casual(&format!("key{}", i), i, None);
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let ctx = ctx.clone();
                            thread::spawn(move || {
                                for i in 0..100 {
                                    black_box(ctx.local().get_casual::<i32>(&format!("key{}", i)));
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_concurrent_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_mixed");

    for num_threads in [2, 4, 8].iter() {
        let ctx = context();

        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|t| {
                            let ctx = ctx.clone();
                            thread::spawn(move || {
                                for i in 0..100 {
                                    let key = format!("key{}", i % 20);
                                    if (i + t) % 4 == 0 {
                                        ctx.local().set_casual(&key, i, None);
                                    } else {
                                        black_box(ctx.local().get_casual::<i32>(&key));
                                    }
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_set_sequential,
    bench_get_sequential,
    bench_template_resolution,
    bench_notify,
    bench_concurrent_reads,
    bench_concurrent_mixed
);
criterion_main!(benches);
