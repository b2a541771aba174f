use codex_cache::cache::{CacheConfig, CacheService, CachedOperation, CallArgs, DefaultKeyMaker, KeyMaker, MemoryBackend};
use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

fn bench_key_maker(c: &mut Criterion) {
    let small = CallArgs::new().named("id", &42);
    let nested = CallArgs::new()
        .arg("How do I register a custom post type?")
        .named(
            "filters",
            &json!({
                "section": "plugins",
                "tags": ["hooks", "actions", "filters"],
                "paging": {"limit": 5, "offset": 0}
            }),
        );

    c.bench_function("key/small_args", |b| {
        b.iter(|| DefaultKeyMaker.make(black_box("app::lookup"), black_box(&small), "lookup"))
    });

    c.bench_function("key/nested_args", |b| {
        b.iter(|| DefaultKeyMaker.make(black_box("rag::answer"), black_box(&nested), "rag.answer"))
    });
}

fn bench_cached_hit(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("build runtime");
    let config = CacheConfig::default();
    let cache = CacheService::new(Arc::new(MemoryBackend::new(config.clone())), config);
    let op = CachedOperation::new("app::lookup").prefix_name("lookup");

    runtime.block_on(async {
        let _: Result<String, std::io::Error> = cache
            .cached(&op, CallArgs::new().named("id", &42), || async {
                Ok("warm".to_string())
            })
            .await;
    });

    c.bench_function("service/cached_hit", |b| {
        b.to_async(&runtime).iter(|| async {
            let value: Result<String, std::io::Error> = cache
                .cached(&op, CallArgs::new().named("id", &42), || async {
                    Ok("cold".to_string())
                })
                .await;
            black_box(value)
        })
    });
}

criterion_group!(benches, bench_key_maker, bench_cached_hit);
criterion_main!(benches);
