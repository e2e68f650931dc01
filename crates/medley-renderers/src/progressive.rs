//! Progressive renderer - the native-element-style backend
//!
//! Plays classic progressive file types behind the facade contract.
//! There is no decoder here: a probe table supplied through options
//! stands in for container inspection, and a [`PlaybackClock`] drives
//! the playhead. Synchronously ready (no SDK to attach), so
//! `rendererready` fires during creation.
//!
//! Owns its source list: a source the probe table marks unplayable
//! raises a decode failure, and while a next candidate exists the
//! renderer advances and reissues load+play itself; only an exhausted
//! list escalates to the facade error channel.

use crate::clock::PlaybackClock;
use medley_core::source::mime_from_type;
use medley_core::{
    Error, EventKind, NetworkState, Preload, ReadyState, Renderer, RendererCategory,
    RendererContext, RendererDescriptor, RendererHost, Result, SourceDescriptor, TimeRanges,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Registered backend name
pub const RENDERER_NAME: &str = "native";

const SUPPORTED_TYPES: [&str; 13] = [
    "audio/mp3",
    "audio/ogg",
    "audio/oga",
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/x-pn-wav",
    "audio/mpeg",
    "audio/mp4",
    "video/mp4",
    "video/webm",
    "video/ogg",
    "video/ogv",
];

/// Capability predicate for the progressive backend
pub fn can_play_type(media_type: &str) -> bool {
    let mime = mime_from_type(media_type).to_ascii_lowercase();
    SUPPORTED_TYPES.contains(&mime.as_str())
}

/// Per-source playback facts consulted at load time. Sources missing
/// from the probe table load with unknown duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default = "default_playable")]
    pub playable: bool,
}

fn default_playable() -> bool {
    true
}

impl Default for MediaInfo {
    fn default() -> Self {
        Self {
            duration: None,
            playable: true,
        }
    }
}

/// Options recognized by the progressive backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressiveOptions {
    /// Cadence of synthesized `timeupdate` events
    pub timeupdate_interval_ms: u64,
    /// Probe table: source URL to playback facts
    pub media: HashMap<String, MediaInfo>,
}

impl Default for ProgressiveOptions {
    fn default() -> Self {
        Self {
            timeupdate_interval_ms: 250,
            media: HashMap::new(),
        }
    }
}

struct ProgressiveState {
    sources: Vec<SourceDescriptor>,
    index: usize,
    loaded: bool,
    volume: f64,
    muted: bool,
    autoplay: bool,
    controls: bool,
    preload: Preload,
    default_rate: f64,
    width: u32,
    height: u32,
    network_state: NetworkState,
    ready_state: ReadyState,
    visible: bool,
    ended: bool,
}

/// Clock-driven progressive playback backend
pub struct ProgressiveRenderer {
    host: RendererHost,
    clock: PlaybackClock,
    media: HashMap<String, MediaInfo>,
    state: Arc<Mutex<ProgressiveState>>,
}

impl ProgressiveRenderer {
    /// Factory wired into the renderer descriptor
    pub fn create(ctx: RendererContext) -> Result<Arc<dyn Renderer>> {
        let options: ProgressiveOptions =
            serde_json::from_value(serde_json::Value::Object(ctx.options))
                .map_err(|e| Error::InvalidConfig(format!("progressive options: {e}")))?;

        let state = Arc::new(Mutex::new(ProgressiveState {
            sources: ctx.sources,
            index: 0,
            loaded: false,
            volume: 1.0,
            muted: false,
            autoplay: false,
            controls: false,
            preload: Preload::default(),
            default_rate: 1.0,
            width: 0,
            height: 0,
            network_state: NetworkState::Empty,
            ready_state: ReadyState::Nothing,
            visible: false,
            ended: false,
        }));

        let host = ctx.host;
        let tick_host = host.clone();
        let ended_host = host.clone();
        let ended_state = Arc::clone(&state);
        let clock = PlaybackClock::new(
            Duration::from_millis(options.timeupdate_interval_ms),
            move |_pos| tick_host.emit(EventKind::TimeUpdate),
            move || {
                ended_state.lock().ended = true;
                ended_host.emit(EventKind::Ended);
            },
        );

        let renderer = Arc::new(ProgressiveRenderer {
            host: host.clone(),
            clock,
            media: options.media,
            state,
        });

        // No SDK to wait for.
        host.emit(EventKind::RendererReady);
        Ok(renderer)
    }

    fn current_source(&self) -> Option<SourceDescriptor> {
        let state = self.state.lock();
        state.sources.get(state.index).cloned()
    }

    /// Probe and announce the current source; on a decode failure
    /// advance to the next candidate and retry, escalating only when
    /// the list is exhausted
    fn load_current(&self) -> bool {
        loop {
            let Some(source) = self.current_source() else {
                return false;
            };
            if source.src.is_empty() {
                return false;
            }

            self.host.emit(EventKind::LoadStart);
            {
                let mut state = self.state.lock();
                state.network_state = NetworkState::Loading;
            }

            let info = self.media.get(&source.src).cloned().unwrap_or_default();
            if info.playable {
                self.clock.set_duration(info.duration);
                {
                    let mut state = self.state.lock();
                    state.loaded = true;
                    state.ended = false;
                    state.network_state = NetworkState::Idle;
                    state.ready_state = ReadyState::EnoughData;
                }
                debug!(src = %source.src, duration = ?info.duration, "source loaded");
                self.host.emit(EventKind::LoadedMetadata);
                self.host.emit(EventKind::DurationChange);
                self.host.emit(EventKind::LoadedData);
                self.host.emit(EventKind::CanPlay);
                return true;
            }

            warn!(src = %source.src, "source failed to decode");
            let (has_next, remaining) = {
                let mut state = self.state.lock();
                if state.index + 1 < state.sources.len() {
                    state.index += 1;
                    (true, Vec::new())
                } else {
                    state.network_state = NetworkState::NoSource;
                    state.ready_state = ReadyState::Nothing;
                    (false, state.sources.clone())
                }
            };

            if !has_next {
                self.host.emit_error(
                    format!("media decode failed for `{}`", source.src),
                    remaining,
                );
                return false;
            }
            // Loop reissues the load against the next candidate.
        }
    }
}

impl Renderer for ProgressiveRenderer {
    fn name(&self) -> &str {
        RENDERER_NAME
    }

    fn current_time(&self) -> Option<f64> {
        Some(self.clock.position())
    }

    fn duration(&self) -> Option<f64> {
        self.clock.duration()
    }

    fn volume(&self) -> Option<f64> {
        Some(self.state.lock().volume)
    }

    fn muted(&self) -> Option<bool> {
        Some(self.state.lock().muted)
    }

    fn paused(&self) -> Option<bool> {
        Some(!self.clock.is_playing())
    }

    fn ended(&self) -> Option<bool> {
        Some(self.state.lock().ended)
    }

    fn network_state(&self) -> Option<NetworkState> {
        Some(self.state.lock().network_state)
    }

    fn ready_state(&self) -> Option<ReadyState> {
        Some(self.state.lock().ready_state)
    }

    fn video_width(&self) -> Option<u32> {
        Some(self.state.lock().width)
    }

    fn video_height(&self) -> Option<u32> {
        Some(self.state.lock().height)
    }

    fn playback_rate(&self) -> Option<f64> {
        Some(self.clock.rate())
    }

    fn default_playback_rate(&self) -> Option<f64> {
        Some(self.state.lock().default_rate)
    }

    fn looping(&self) -> Option<bool> {
        Some(self.clock.looping())
    }

    fn autoplay(&self) -> Option<bool> {
        Some(self.state.lock().autoplay)
    }

    fn controls(&self) -> Option<bool> {
        Some(self.state.lock().controls)
    }

    fn preload(&self) -> Option<Preload> {
        Some(self.state.lock().preload)
    }

    fn buffered(&self) -> Option<TimeRanges> {
        let state = self.state.lock();
        if !state.loaded {
            return Some(TimeRanges::default());
        }
        let end = self.clock.duration().unwrap_or_else(|| self.clock.position());
        Some(TimeRanges::new(vec![(0.0, end)]))
    }

    fn seekable(&self) -> Option<TimeRanges> {
        self.buffered()
    }

    fn current_src(&self) -> Option<String> {
        self.current_source().map(|s| s.src)
    }

    fn get_src(&self) -> Option<String> {
        self.current_src()
    }

    fn set_src(&self, source: SourceDescriptor) {
        {
            let mut state = self.state.lock();
            state.sources = vec![source];
            state.index = 0;
            state.loaded = false;
            state.ended = false;
            state.network_state = NetworkState::Idle;
            state.ready_state = ReadyState::Nothing;
        }
        self.clock.stop();
        self.clock.set_duration(None);
    }

    fn load(&self) -> Result<()> {
        self.load_current();
        Ok(())
    }

    fn play(&self) -> Result<()> {
        if !self.state.lock().loaded {
            // Reissue of load+play after a source swap or fallback.
            if !self.load_current() {
                return Ok(());
            }
        }
        self.clock.play();
        self.host.emit(EventKind::Play);
        self.host.emit(EventKind::Playing);
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.clock.pause();
        self.host.emit(EventKind::Pause);
        Ok(())
    }

    fn can_play_type(&self, media_type: &str) -> bool {
        can_play_type(media_type)
    }

    fn stop(&self) {
        self.clock.stop();
    }

    fn set_current_time(&self, time: f64) {
        self.host.emit(EventKind::Seeking);
        self.clock.seek(time);
        self.host.emit(EventKind::Seeked);
    }

    fn set_volume(&self, volume: f64) {
        self.state.lock().volume = volume.clamp(0.0, 1.0);
        self.host.emit(EventKind::VolumeChange);
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
        self.host.emit(EventKind::VolumeChange);
    }

    fn set_playback_rate(&self, rate: f64) {
        self.clock.set_rate(rate);
        self.host.emit(EventKind::RateChange);
    }

    fn set_default_playback_rate(&self, rate: f64) {
        self.state.lock().default_rate = rate;
    }

    fn set_looping(&self, looping: bool) {
        self.clock.set_looping(looping);
    }

    fn set_autoplay(&self, autoplay: bool) {
        self.state.lock().autoplay = autoplay;
    }

    fn set_controls(&self, controls: bool) {
        self.state.lock().controls = controls;
    }

    fn set_preload(&self, preload: Preload) {
        self.state.lock().preload = preload;
    }

    fn show(&self) {
        self.state.lock().visible = true;
    }

    fn hide(&self) {
        let was_visible = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.visible, false)
        };
        if was_visible {
            self.clock.pause();
        }
    }

    fn set_size(&self, width: u32, height: u32) {
        {
            let mut state = self.state.lock();
            state.width = width;
            state.height = height;
        }
        self.host.emit(EventKind::Resize);
    }

    fn destroy(&self) {
        self.clock.stop();
    }
}

/// Registration descriptor for the progressive backend
pub fn descriptor() -> RendererDescriptor {
    RendererDescriptor::new(
        RENDERER_NAME,
        RendererCategory::Native,
        can_play_type,
        ProgressiveRenderer::create,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use medley_core::RecordingSink;
    use serde_json::json;

    fn options(media: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match json!({ "media": media }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn build(
        sources: Vec<SourceDescriptor>,
        media: serde_json::Value,
    ) -> (Arc<dyn Renderer>, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        let renderer = ProgressiveRenderer::create(RendererContext {
            host: sink.host(RENDERER_NAME),
            options: options(media),
            sources,
        })
        .unwrap();
        (renderer, sink)
    }

    #[test]
    fn test_capability_table() {
        assert!(can_play_type("video/mp4"));
        assert!(can_play_type("video/mp4;codecs=\"avc1.42E01E\""));
        assert!(can_play_type("audio/mp3"));
        assert!(!can_play_type("application/x-mpegurl"));
        assert!(!can_play_type("video/x-cast"));
        assert!(!can_play_type(""));
    }

    #[test]
    fn test_ready_and_load_event_sequence() {
        let (renderer, sink) = build(
            vec![SourceDescriptor::new("a.mp4", "video/mp4")],
            json!({ "a.mp4": { "duration": 120.0 } }),
        );

        renderer.load().unwrap();
        assert_eq!(
            sink.kinds(),
            vec![
                EventKind::RendererReady,
                EventKind::LoadStart,
                EventKind::LoadedMetadata,
                EventKind::DurationChange,
                EventKind::LoadedData,
                EventKind::CanPlay,
            ]
        );
        assert_eq!(renderer.duration(), Some(120.0));
        assert_eq!(renderer.ready_state(), Some(ReadyState::EnoughData));
    }

    #[test]
    fn test_fallback_advances_to_next_playable_source() {
        let (renderer, sink) = build(
            vec![
                SourceDescriptor::new("bad.mp4", "video/mp4"),
                SourceDescriptor::new("good.mp4", "video/mp4"),
            ],
            json!({
                "bad.mp4": { "playable": false },
                "good.mp4": { "duration": 30.0 }
            }),
        );

        renderer.play().unwrap();

        // No error escalated: the second candidate took over.
        assert!(!sink.kinds().contains(&EventKind::Error));
        assert_eq!(renderer.get_src().as_deref(), Some("good.mp4"));
        assert_eq!(renderer.duration(), Some(30.0));
        assert_eq!(renderer.paused(), Some(false));
    }

    #[test]
    fn test_exhausted_fallback_escalates_error() {
        let (renderer, sink) = build(
            vec![
                SourceDescriptor::new("bad1.mp4", "video/mp4"),
                SourceDescriptor::new("bad2.mp4", "video/mp4"),
            ],
            json!({
                "bad1.mp4": { "playable": false },
                "bad2.mp4": { "playable": false }
            }),
        );

        renderer.play().unwrap();

        let events = sink.events();
        let errors: Vec<_> = events
            .iter()
            .filter(|(_, e)| e.kind == EventKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .1
            .message
            .as_deref()
            .unwrap()
            .contains("bad2.mp4"));
        assert_eq!(errors[0].1.sources.len(), 2);
        assert_eq!(renderer.paused(), Some(true));
        assert_eq!(renderer.network_state(), Some(NetworkState::NoSource));
    }

    #[test]
    fn test_set_src_resets_playback_state() {
        let (renderer, _sink) = build(
            vec![SourceDescriptor::new("a.mp4", "video/mp4")],
            json!({ "a.mp4": { "duration": 10.0 } }),
        );
        renderer.load().unwrap();
        renderer.set_current_time(5.0);

        renderer.set_src(SourceDescriptor::new("b.mp4", "video/mp4"));
        assert_eq!(renderer.get_src().as_deref(), Some("b.mp4"));
        assert_eq!(renderer.current_time(), Some(0.0));
        assert_eq!(renderer.duration(), None);
        assert_eq!(renderer.ready_state(), Some(ReadyState::Nothing));
    }

    #[test]
    fn test_volume_and_rate_events() {
        let (renderer, sink) = build(vec![SourceDescriptor::new("a.mp4", "video/mp4")], json!({}));
        sink.clear();

        renderer.set_volume(0.3);
        renderer.set_muted(true);
        renderer.set_playback_rate(1.5);
        assert_eq!(
            sink.kinds(),
            vec![
                EventKind::VolumeChange,
                EventKind::VolumeChange,
                EventKind::RateChange,
            ]
        );
        assert_eq!(renderer.volume(), Some(0.3));
        assert_eq!(renderer.muted(), Some(true));
        assert_eq!(renderer.playback_rate(), Some(1.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_emits_timeupdate_and_ended() {
        let (renderer, sink) = build(
            vec![SourceDescriptor::new("a.mp4", "video/mp4")],
            json!({ "a.mp4": { "duration": 0.5 } }),
        );

        renderer.play().unwrap();
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        let kinds = sink.kinds();
        assert!(kinds.contains(&EventKind::TimeUpdate));
        assert!(kinds.contains(&EventKind::Ended));
        assert_eq!(renderer.ended(), Some(true));
        assert_eq!(renderer.current_time(), Some(0.5));
    }
}
