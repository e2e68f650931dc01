//! Backend selection example
//!
//! Demonstrates source-type resolution and capability-based renderer
//! selection without any concrete backend attached.
//!
//! Run with: cargo run -p medley-core --example backend_selection

use medley_core::renderer::Renderer;
use medley_core::{
    RendererCategory, RendererDescriptor, RendererRegistry, SourceDescriptor, SourceResolver,
};
use std::sync::Arc;

struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn name(&self) -> &str {
        "noop"
    }
}

fn descriptor(
    name: &str,
    category: RendererCategory,
    types: &'static [&'static str],
) -> RendererDescriptor {
    RendererDescriptor::new(
        name,
        category,
        move |t| types.contains(&t),
        |_ctx| Ok(Arc::new(NoopRenderer) as Arc<dyn Renderer>),
    )
}

fn main() {
    println!("Medley Core - Backend Selection Example");
    println!("=======================================\n");

    // Resolve media types the way the facade does.
    let mut resolver = SourceResolver::new();
    resolver.add_sniffer(|url| url.ends_with(".m3u8").then(|| "application/x-mpegurl".to_string()));

    println!("Type resolution:");
    for url in ["movie.m4v", "clip.ogv", "live.m3u8", "track.mp3", "mystery.bin"] {
        let media_type = resolver.resolve_type(url, None).unwrap();
        println!("  {url:<12} -> {media_type}");
    }
    println!();

    // Register three backend families out of order.
    let mut registry = RendererRegistry::new();
    registry
        .add(descriptor(
            "remote_cast",
            RendererCategory::Embedded,
            &["video/x-cast"],
        ))
        .unwrap();
    registry
        .add(descriptor(
            "streaming_hls",
            RendererCategory::StreamingPlugin,
            &["application/x-mpegurl"],
        ))
        .unwrap();
    registry
        .add(descriptor(
            "native",
            RendererCategory::Native,
            &["video/mp4", "video/webm", "video/ogg"],
        ))
        .unwrap();

    println!("Registration order: {:?}", registry.order());
    println!("Ranked order:       {:?}\n", registry.ranked_order());

    // Backend preference dominates source order: native can only play
    // the second candidate, yet it still wins.
    let candidates = vec![
        SourceDescriptor::new("https://cdn.example.com/live.m3u8", "application/x-mpegurl"),
        SourceDescriptor::new("https://cdn.example.com/movie.mp4", "video/mp4"),
    ];

    println!("Candidates (fallback order):");
    for c in &candidates {
        println!("  {} ({})", c.src, c.media_type);
    }

    match registry.select(&candidates, &[]) {
        Some(selection) => println!(
            "\nSelected: {} playing {}",
            selection.renderer, selection.src.src
        ),
        None => println!("\nNo renderer found"),
    }

    // An explicit preference list is used verbatim.
    let preference = vec!["streaming_hls".to_string()];
    if let Some(selection) = registry.select(&candidates, &preference) {
        println!(
            "With preference {:?}: {} playing {}",
            preference, selection.renderer, selection.src.src
        );
    }

    println!("\nExample complete!");
}
