//! Benchmark tests for medley-core operations
//!
//! Run with: cargo bench -p medley-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use medley_core::renderer::Renderer;
use medley_core::{
    RendererCategory, RendererDescriptor, RendererRegistry, SourceDescriptor, SourceResolver,
};

// ============================================================================
// Helpers
// ============================================================================

struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn name(&self) -> &str {
        "noop"
    }
}

fn registry_with(backends: usize) -> RendererRegistry {
    let mut registry = RendererRegistry::new();
    for i in 0..backends {
        let category = match i % 3 {
            0 => RendererCategory::Embedded,
            1 => RendererCategory::StreamingPlugin,
            _ => RendererCategory::Native,
        };
        let claimed = format!("video/bench-{i}");
        registry
            .add(RendererDescriptor::new(
                format!("backend_{i}"),
                category,
                move |t| t == claimed,
                |_ctx| Ok(Arc::new(NoopRenderer) as Arc<dyn Renderer>),
            ))
            .unwrap();
    }
    registry
}

fn candidate_sources(count: usize) -> Vec<SourceDescriptor> {
    (0..count)
        .map(|i| SourceDescriptor::new(format!("https://cdn.example.com/clip{i}.bin"), format!("video/bench-{i}")))
        .collect()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_resolve_type(c: &mut Criterion) {
    let mut resolver = SourceResolver::new();
    resolver.add_sniffer(|url| url.ends_with(".m3u8").then(|| "application/x-mpegurl".to_string()));
    resolver.add_sniffer(|url| url.starts_with("cast://").then(|| "video/x-cast".to_string()));

    c.bench_function("resolve_type_extension", |b| {
        b.iter(|| {
            resolver
                .resolve_type(black_box("https://cdn.example.com/movie.m4v?token=abc"), None)
                .unwrap()
        })
    });

    c.bench_function("resolve_type_sniffer", |b| {
        b.iter(|| {
            resolver
                .resolve_type(black_box("https://cdn.example.com/live.m3u8"), None)
                .unwrap()
        })
    });
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_select");
    for backends in [4usize, 16, 64] {
        let registry = registry_with(backends);
        // Worst case: only the last backend matches the last source.
        let sources = candidate_sources(backends);
        group.bench_with_input(
            BenchmarkId::from_parameter(backends),
            &backends,
            |b, _| {
                b.iter(|| registry.select(black_box(&sources), &[]).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_ranked_order(c: &mut Criterion) {
    let registry = registry_with(64);
    c.bench_function("ranked_order_64", |b| {
        b.iter(|| black_box(registry.ranked_order()));
    });
}

criterion_group!(benches, bench_resolve_type, bench_select, bench_ranked_order);
criterion_main!(benches);
