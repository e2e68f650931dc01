//! Facade playback example
//!
//! Builds a full facade session over the reference backends, swaps
//! between them by source type, and prints the normalized event
//! stream.
//!
//! Run with: cargo run -p medley-renderers --example facade_playback

use anyhow::Result;
use medley_core::{
    EventKind, FacadeConfig, MediaFacade, Placeholder, RendererRegistry, SetupCallbacks,
    SourceResolver,
};
use medley_renderers::register_defaults;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    medley_core::init();

    let mut registry = RendererRegistry::new();
    let mut resolver = SourceResolver::new();
    register_defaults(&mut registry, &mut resolver)?;

    let renderer_options = match json!({
        "media": {
            "https://cdn.example.com/movie.mp4": { "duration": 3.0 },
            "cast://living-room/tv": { "duration": 45.0 }
        },
        "manifests": {
            "https://cdn.example.com/live.m3u8":
                "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg0.ts\n#EXTINF:6.0,\nseg1.ts\n#EXT-X-ENDLIST\n"
        }
    }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };

    let config = FacadeConfig {
        renderer_options,
        ..Default::default()
    };

    let facade = MediaFacade::create(
        Placeholder::new("demo-player"),
        config,
        Arc::new(registry),
        Arc::new(resolver),
        SetupCallbacks::default()
            .on_success(|f| println!("setup settled for facade {}", f.id())),
    )?;

    // Watch the normalized event contract.
    for kind in [
        EventKind::RendererReady,
        EventKind::LoadedMetadata,
        EventKind::DurationChange,
        EventKind::Playing,
        EventKind::TimeUpdate,
        EventKind::Ended,
        EventKind::Error,
    ] {
        facade.add_event_listener(kind, move |event| {
            println!("  event: {}", event.kind);
        });
    }

    println!("\n--- progressive file ---");
    facade.set_src("https://cdn.example.com/movie.mp4");
    println!("active renderer: {:?}", facade.renderer_name());
    facade.play();
    tokio::time::sleep(Duration::from_secs(4)).await;
    println!(
        "position {:?} / duration {:?}, ended: {:?}",
        facade.current_time(),
        facade.duration(),
        facade.ended()
    );

    println!("\n--- HLS playlist (sniffed from the URL) ---");
    facade.set_src("https://cdn.example.com/live.m3u8");
    facade.play();
    tokio::time::sleep(Duration::from_millis(500)).await;
    println!(
        "active renderer: {:?}, duration {:?}",
        facade.renderer_name(),
        facade.duration()
    );

    println!("\n--- remote cast session ---");
    facade.set_src("cast://living-room/tv");
    tokio::time::sleep(Duration::from_millis(200)).await;
    println!(
        "active renderer: {:?}, duration {:?}",
        facade.renderer_name(),
        facade.duration()
    );

    println!(
        "\ncached instances: {:?}",
        facade.cached_renderer_names()
    );
    facade.destroy();
    println!("facade destroyed");

    Ok(())
}
