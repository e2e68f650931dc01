//! Integration tests for the reference backends behind a real facade
//!
//! Wires `register_defaults` into a facade session and drives the
//! public surface only: selection by sniffed type, backend swaps with
//! instance caching, deferred-call replay over real async readiness,
//! and the init watchdog against a dead receiver.

use medley_core::{
    EventKind, FacadeConfig, MediaEvent, MediaFacade, Placeholder, RendererRegistry,
    SetupCallbacks, SourceResolver, SourceSpec,
};
use medley_renderers::register_defaults;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn options(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn facade(renderer_options: serde_json::Value) -> MediaFacade {
    let mut registry = RendererRegistry::new();
    let mut resolver = SourceResolver::new();
    register_defaults(&mut registry, &mut resolver).unwrap();

    let config = FacadeConfig {
        renderer_options: options(renderer_options),
        ..Default::default()
    };
    MediaFacade::create(
        Placeholder::new("player1"),
        config,
        Arc::new(registry),
        Arc::new(resolver),
        SetupCallbacks::default(),
    )
    .unwrap()
}

fn capture(facade: &MediaFacade, kind: EventKind) -> Arc<Mutex<Vec<MediaEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    facade.add_event_listener(kind, move |e| sink.lock().push(e.clone()));
    events
}

const VOD_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:6\n\
#EXTINF:6.0,\n\
seg0.ts\n\
#EXTINF:6.0,\n\
seg1.ts\n\
#EXT-X-ENDLIST\n";

#[tokio::test(start_paused = true)]
async fn test_progressive_playback_through_the_facade() {
    let facade = facade(json!({
        "media": { "movie.mp4": { "duration": 2.0 } }
    }));
    let ended = capture(&facade, EventKind::Ended);

    facade.set_src("movie.mp4");
    assert_eq!(facade.renderer_name().as_deref(), Some("native"));

    facade.load();
    assert_eq!(facade.duration(), Some(2.0));

    facade.play();
    assert_eq!(facade.paused(), Some(false));

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(facade.current_time(), Some(2.0));
    assert_eq!(facade.ended(), Some(true));
    assert_eq!(ended.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_m3u8_url_selects_streaming_backend_via_sniffer() {
    let facade = facade(json!({
        "manifests": { "live.m3u8": VOD_PLAYLIST }
    }));
    let ready = capture(&facade, EventKind::RendererReady);

    // Bare URL, no type hint: the sniffer claims it for HLS ahead of
    // the extension fallback.
    facade.set_src("live.m3u8");
    assert_eq!(facade.renderer_name().as_deref(), Some("streaming_hls"));

    // Issued before the playlist resolves; replayed once ready.
    facade.play();
    assert_eq!(facade.paused(), Some(true));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ready.lock().len(), 1);
    assert_eq!(facade.duration(), Some(12.0));
    assert_eq!(facade.paused(), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_cast_url_selects_remote_backend() {
    let facade = facade(json!({
        "attach_delay_ms": 30,
        "media": { "cast://living-room/tv": { "duration": 45.0 } }
    }));

    facade.set_src("cast://living-room/tv");
    assert_eq!(facade.renderer_name().as_deref(), Some("remote_cast"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(facade.duration(), Some(45.0));
}

#[tokio::test(start_paused = true)]
async fn test_swapping_backends_keeps_instances_cached() {
    let facade = facade(json!({
        "media": { "movie.mp4": { "duration": 60.0 } },
        "manifests": { "live.m3u8": VOD_PLAYLIST }
    }));

    facade.set_src("movie.mp4");
    tokio::time::sleep(Duration::from_millis(10)).await;
    facade.set_src("live.m3u8");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(facade.renderer_name().as_deref(), Some("streaming_hls"));
    assert_eq!(
        facade.cached_renderer_names(),
        vec!["native".to_string(), "streaming_hls".to_string()]
    );

    // Swapping back revives the cached native instance.
    facade.set_src("movie.mp4");
    assert_eq!(facade.renderer_name().as_deref(), Some("native"));
    assert_eq!(facade.cached_renderer_names().len(), 2);
    assert_eq!(facade.src().as_deref(), Some("movie.mp4"));
}

#[tokio::test(start_paused = true)]
async fn test_dead_receiver_trips_init_watchdog() {
    let mut registry = RendererRegistry::new();
    let mut resolver = SourceResolver::new();
    register_defaults(&mut registry, &mut resolver).unwrap();

    let config = FacadeConfig {
        init_timeout_ms: Some(2_000),
        renderer_options: options(json!({ "attach": false })),
        ..Default::default()
    };
    let facade = MediaFacade::create(
        Placeholder::new("player1"),
        config,
        Arc::new(registry),
        Arc::new(resolver),
        SetupCallbacks::default(),
    )
    .unwrap();
    let errors = capture(&facade, EventKind::Error);

    facade.set_src("cast://dead/receiver");
    facade.play();

    tokio::time::sleep(Duration::from_millis(3_000)).await;

    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .message
        .as_deref()
        .unwrap()
        .contains("remote_cast"));
    assert!(facade.had_error());
}

#[tokio::test(start_paused = true)]
async fn test_progressive_fallback_is_invisible_to_the_caller() {
    let facade = facade(json!({
        "media": {
            "broken.mp4": { "playable": false },
            "backup.mp4": { "duration": 10.0 }
        }
    }));
    let errors = capture(&facade, EventKind::Error);

    facade.set_src(vec![
        SourceSpec::new("broken.mp4"),
        SourceSpec::new("backup.mp4"),
    ]);
    facade.play();

    // The backend walked its own fallback list; no facade-level error.
    assert!(errors.lock().is_empty());
    assert_eq!(facade.src().as_deref(), Some("backup.mp4"));
    assert_eq!(facade.duration(), Some(10.0));
    assert_eq!(facade.paused(), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_fallback_surfaces_backend_error() {
    let facade = facade(json!({
        "media": { "broken.mp4": { "playable": false } }
    }));
    let errors = capture(&facade, EventKind::Error);

    facade.set_src("broken.mp4");
    facade.play();

    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .message
        .as_deref()
        .unwrap()
        .contains("broken.mp4"));
    assert_eq!(errors[0].sources.len(), 1);
}
