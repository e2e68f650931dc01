//! Renderer instance contract
//!
//! Every backend plugin implements [`Renderer`] for its per-session
//! instance and registers a [`crate::registry::RendererDescriptor`]
//! carrying the static capability predicate and factory. Property
//! accessors return `Option`: `None` means the backend does not expose
//! that capability, and the facade relays it as a null result rather
//! than an error. Setters default to no-ops for the same reason.
//!
//! Backends that wrap an asynchronously-attached SDK must queue
//! property/method calls issued before the SDK signals readiness and
//! replay them in original order once ready, then emit `rendererready`
//! exactly once. Synchronously-ready backends emit `rendererready`
//! during creation.

use crate::events::{EventKind, MediaEvent};
use crate::types::{NetworkState, Preload, ReadyState, SourceDescriptor, TimeRanges};
use crate::Result;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Concrete backend instance driving real playback for one facade
/// session.
///
/// At most one instance per distinct backend name exists per facade;
/// instances are cached by name and reused on re-selection.
pub trait Renderer: Send + Sync {
    /// The registered backend name this instance was created under
    fn name(&self) -> &str;

    // Property getters; `None` = capability not exposed
    fn current_time(&self) -> Option<f64> {
        None
    }
    fn duration(&self) -> Option<f64> {
        None
    }
    fn volume(&self) -> Option<f64> {
        None
    }
    fn muted(&self) -> Option<bool> {
        None
    }
    fn paused(&self) -> Option<bool> {
        None
    }
    fn ended(&self) -> Option<bool> {
        None
    }
    fn seeking(&self) -> Option<bool> {
        None
    }
    fn network_state(&self) -> Option<NetworkState> {
        None
    }
    fn ready_state(&self) -> Option<ReadyState> {
        None
    }
    fn video_width(&self) -> Option<u32> {
        None
    }
    fn video_height(&self) -> Option<u32> {
        None
    }
    fn playback_rate(&self) -> Option<f64> {
        None
    }
    fn default_playback_rate(&self) -> Option<f64> {
        None
    }
    fn looping(&self) -> Option<bool> {
        None
    }
    fn autoplay(&self) -> Option<bool> {
        None
    }
    fn controls(&self) -> Option<bool> {
        None
    }
    fn preload(&self) -> Option<Preload> {
        None
    }
    fn buffered(&self) -> Option<TimeRanges> {
        None
    }
    fn seekable(&self) -> Option<TimeRanges> {
        None
    }
    fn current_src(&self) -> Option<String> {
        None
    }

    /// The source this instance currently plays
    fn get_src(&self) -> Option<String> {
        None
    }

    // Property setters; default no-op = capability not exposed
    fn set_current_time(&self, _time: f64) {}
    fn set_volume(&self, _volume: f64) {}
    fn set_muted(&self, _muted: bool) {}
    fn set_playback_rate(&self, _rate: f64) {}
    fn set_default_playback_rate(&self, _rate: f64) {}
    fn set_looping(&self, _looping: bool) {}
    fn set_autoplay(&self, _autoplay: bool) {}
    fn set_controls(&self, _controls: bool) {}
    fn set_preload(&self, _preload: Preload) {}
    fn set_src(&self, _source: SourceDescriptor) {}

    // Methods
    fn load(&self) -> Result<()> {
        Ok(())
    }
    fn play(&self) -> Result<()> {
        Ok(())
    }
    fn pause(&self) -> Result<()> {
        Ok(())
    }
    /// Instance-level capability check, normally matching the
    /// descriptor predicate
    fn can_play_type(&self, _media_type: &str) -> bool {
        false
    }
    /// Optional full stop; invoked after `pause` on every swap
    fn stop(&self) {}

    // Lifecycle
    fn show(&self) {}
    fn hide(&self) {}
    fn set_size(&self, _width: u32, _height: u32) {}
    /// Release backend resources. Invoked by the owning facade on
    /// teardown for every cached instance.
    fn destroy(&self) {}
}

/// Factory input handed to a renderer descriptor's `create`
pub struct RendererContext {
    /// Channel back to the owning facade
    pub host: RendererHost,
    /// Renderer defaults merged with caller-supplied options
    pub options: Map<String, Value>,
    /// Ordered candidate list; order is fallback order
    pub sources: Vec<SourceDescriptor>,
}

/// Receiver for backend-originated events; implemented by the facade
pub trait EventSink: Send + Sync {
    /// Deliver `event` originated by the renderer registered as
    /// `renderer`
    fn renderer_event(&self, renderer: &str, event: MediaEvent);
}

/// Handle a renderer instance uses to reach the facade that owns it.
///
/// Holds only a weak reference: a renderer outliving its facade (a
/// superseded init task, a straggling clock tick) emits into the void
/// instead of keeping the facade alive.
#[derive(Clone)]
pub struct RendererHost {
    sink: Weak<dyn EventSink>,
    renderer: String,
}

impl RendererHost {
    pub fn new(sink: Weak<dyn EventSink>, renderer: impl Into<String>) -> Self {
        Self {
            sink,
            renderer: renderer.into(),
        }
    }

    /// Host with no facade attached; every emission is dropped. Useful
    /// for driving a renderer in isolation.
    pub fn detached(renderer: impl Into<String>) -> Self {
        Self {
            sink: Weak::<DetachedSink>::new(),
            renderer: renderer.into(),
        }
    }

    /// Name of the renderer this host was issued to
    pub fn renderer(&self) -> &str {
        &self.renderer
    }

    /// Emit a bare event of `kind`
    pub fn emit(&self, kind: EventKind) {
        self.emit_event(MediaEvent::new(kind));
    }

    /// Emit a fully-formed event
    pub fn emit_event(&self, event: MediaEvent) {
        match self.sink.upgrade() {
            Some(sink) => sink.renderer_event(&self.renderer, event),
            None => trace!(renderer = %self.renderer, "facade gone, event dropped"),
        }
    }

    /// Report a playback-time failure with the offending source list
    pub fn emit_error(&self, message: impl Into<String>, sources: Vec<SourceDescriptor>) {
        self.emit_event(MediaEvent::error(message, sources));
    }
}

impl std::fmt::Debug for RendererHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererHost")
            .field("renderer", &self.renderer)
            .field("attached", &self.sink.upgrade().is_some())
            .finish()
    }
}

struct DetachedSink;

impl EventSink for DetachedSink {
    fn renderer_event(&self, _renderer: &str, _event: MediaEvent) {}
}

/// Convenience for tests and standalone renderer harnesses: an
/// [`EventSink`] that records everything it receives
#[derive(Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<(String, MediaEvent)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Host wired to this sink
    pub fn host(self: &Arc<Self>, renderer: impl Into<String>) -> RendererHost {
        let weak: Weak<dyn EventSink> = Arc::downgrade(&(Arc::clone(self) as Arc<dyn EventSink>));
        RendererHost::new(weak, renderer)
    }

    /// Kinds received so far, in arrival order
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|(_, e)| e.kind).collect()
    }

    /// Full received events, in arrival order
    pub fn events(&self) -> Vec<(String, MediaEvent)> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn renderer_event(&self, renderer: &str, event: MediaEvent) {
        self.events.lock().push((renderer.to_string(), event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareRenderer;

    impl Renderer for BareRenderer {
        fn name(&self) -> &str {
            "bare"
        }
    }

    #[test]
    fn test_default_surface_is_null_object() {
        let renderer = BareRenderer;
        assert_eq!(renderer.current_time(), None);
        assert_eq!(renderer.duration(), None);
        assert_eq!(renderer.paused(), None);
        assert!(!renderer.can_play_type("video/mp4"));
        // Setters and lifecycle hooks are no-ops, not panics.
        renderer.set_volume(0.5);
        renderer.show();
        renderer.stop();
        assert!(renderer.load().is_ok());
    }

    #[test]
    fn test_detached_host_drops_events() {
        let host = RendererHost::detached("bare");
        host.emit(EventKind::Play);
        host.emit_error("nothing listens", Vec::new());
        assert_eq!(host.renderer(), "bare");
    }

    #[test]
    fn test_recording_sink_captures_in_order() {
        let sink = RecordingSink::new();
        let host = sink.host("bare");
        host.emit(EventKind::LoadStart);
        host.emit(EventKind::CanPlay);
        assert_eq!(sink.kinds(), vec![EventKind::LoadStart, EventKind::CanPlay]);
        assert_eq!(sink.events()[0].0, "bare");
    }
}
