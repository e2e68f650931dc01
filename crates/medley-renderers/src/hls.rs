//! HLS streaming renderer
//!
//! Segmented-streaming backend: resolves the media playlist off-task
//! (HTTP fetch plus m3u8 parse), derives the timeline from the segment
//! durations, and only then signals readiness. Calls issued before the
//! playlist resolves go through the shared [`ReadyGate`] apply-stack
//! and replay in issuance order.
//!
//! Registers a URL sniffer so bare `.m3u8` URLs resolve to the HLS
//! media type ahead of extension heuristics.

use crate::clock::PlaybackClock;
use crate::gate::ReadyGate;
use async_trait::async_trait;
use medley_core::source::mime_from_type;
use medley_core::{
    Error, EventKind, NetworkState, ReadyState, Renderer, RendererCategory, RendererContext,
    RendererDescriptor, RendererHost, Result, SourceDescriptor, TimeRanges,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::{debug, warn};

/// Registered backend name
pub const RENDERER_NAME: &str = "streaming_hls";

const SUPPORTED_TYPES: [&str; 5] = [
    "application/x-mpegurl",
    "application/vnd.apple.mpegurl",
    "application/mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
];

/// Capability predicate for the HLS backend
pub fn can_play_type(media_type: &str) -> bool {
    let mime = mime_from_type(media_type).to_ascii_lowercase();
    SUPPORTED_TYPES.contains(&mime.as_str())
}

/// URL sniffer claiming `.m3u8` resources ahead of extension mapping
pub fn sniff_url(url: &str) -> Option<String> {
    let path = url.split('?').next().unwrap_or(url);
    path.to_ascii_lowercase()
        .ends_with(".m3u8")
        .then(|| "application/x-mpegURL".to_string())
}

/// Playlist loading/parsing failures
#[derive(ThisError, Debug)]
pub enum ManifestError {
    #[error("failed to fetch playlist: {0}")]
    Fetch(String),

    #[error("failed to parse playlist: {0}")]
    Parse(String),

    #[error("master playlist has no segments; point at a variant playlist")]
    MasterPlaylist,
}

/// Source of playlist text, abstracted so tests and embedders can feed
/// manifests without a network
#[async_trait]
pub trait PlaylistFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<String, ManifestError>;
}

/// HTTP playlist fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaylistFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<String, ManifestError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ManifestError::Fetch(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| ManifestError::Fetch(e.to_string()))
    }
}

/// Fetcher preferring inline manifests from the options table, falling
/// back to HTTP for URLs the table does not cover
pub struct TableFetcher {
    manifests: HashMap<String, String>,
    http: HttpFetcher,
}

impl TableFetcher {
    pub fn new(manifests: HashMap<String, String>) -> Self {
        Self {
            manifests,
            http: HttpFetcher::new(),
        }
    }
}

#[async_trait]
impl PlaylistFetcher for TableFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<String, ManifestError> {
        match self.manifests.get(url) {
            Some(text) => Ok(text.clone()),
            None => self.http.fetch(url).await,
        }
    }
}

/// Total timeline length of a media playlist, from its segment
/// durations
pub fn playlist_duration(content: &str) -> std::result::Result<f64, ManifestError> {
    if content.contains("#EXT-X-STREAM-INF") {
        return Err(ManifestError::MasterPlaylist);
    }
    let parsed = m3u8_rs::parse_media_playlist_res(content.as_bytes())
        .map_err(|e| ManifestError::Parse(format!("{:?}", e)))?;
    Ok(parsed.segments.iter().map(|s| s.duration as f64).sum())
}

/// Options recognized by the HLS backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HlsOptions {
    /// Cadence of synthesized `timeupdate` events
    pub timeupdate_interval_ms: u64,
    /// Inline manifests: playlist URL to playlist text
    pub manifests: HashMap<String, String>,
}

impl Default for HlsOptions {
    fn default() -> Self {
        Self {
            timeupdate_interval_ms: 250,
            manifests: HashMap::new(),
        }
    }
}

/// Calls deferred until the playlist resolves
enum HlsCommand {
    Load,
    Play,
    Pause,
    Seek(f64),
    SetVolume(f64),
    SetMuted(bool),
    SetSrc(SourceDescriptor),
}

struct HlsState {
    sources: Vec<SourceDescriptor>,
    index: usize,
    loaded: bool,
    volume: f64,
    muted: bool,
    network_state: NetworkState,
    ready_state: ReadyState,
    visible: bool,
    ended: bool,
}

/// Segmented-streaming backend over HLS media playlists
pub struct HlsStreamRenderer {
    host: RendererHost,
    clock: PlaybackClock,
    gate: ReadyGate<HlsCommand>,
    fetcher: Arc<dyn PlaylistFetcher>,
    state: Arc<Mutex<HlsState>>,
    announced: AtomicBool,
    weak: std::sync::Weak<HlsStreamRenderer>,
}

impl HlsStreamRenderer {
    /// Factory wired into the renderer descriptor
    pub fn create(ctx: RendererContext) -> Result<Arc<dyn Renderer>> {
        let options: HlsOptions = serde_json::from_value(serde_json::Value::Object(ctx.options))
            .map_err(|e| Error::InvalidConfig(format!("hls options: {e}")))?;

        let state = Arc::new(Mutex::new(HlsState {
            sources: ctx.sources,
            index: 0,
            loaded: false,
            volume: 1.0,
            muted: false,
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

        let renderer = Arc::new_cyclic(|weak| HlsStreamRenderer {
            host,
            clock,
            gate: ReadyGate::new(),
            fetcher: Arc::new(TableFetcher::new(options.manifests)),
            state,
            announced: AtomicBool::new(false),
            weak: weak.clone(),
        });

        renderer.clone().spawn_initialize();
        Ok(renderer)
    }

    /// Kick off playlist resolution on the runtime; without one the
    /// renderer can never become ready
    fn spawn_initialize(self: Arc<Self>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    self.initialize().await;
                });
            }
            Err(_) => {
                warn!("no async runtime, streaming renderer cannot initialize");
            }
        }
    }

    /// Resolve the playlist for the current source, walking the
    /// fallback list on failure; escalates only when the list is
    /// exhausted
    async fn initialize(self: Arc<Self>) {
        loop {
            let source = {
                let state = self.state.lock();
                state.sources.get(state.index).cloned()
            };
            let Some(source) = source else {
                return;
            };

            self.state.lock().network_state = NetworkState::Loading;
            self.host.emit(EventKind::LoadStart);

            let resolved = match self.fetcher.fetch(&source.src).await {
                Ok(content) => playlist_duration(&content),
                Err(e) => Err(e),
            };

            match resolved {
                Ok(duration) => {
                    self.clock.set_duration(Some(duration));
                    {
                        let mut state = self.state.lock();
                        state.loaded = true;
                        state.ended = false;
                        state.network_state = NetworkState::Idle;
                        state.ready_state = ReadyState::Metadata;
                    }
                    debug!(src = %source.src, duration, "playlist resolved");
                    self.host.emit(EventKind::LoadedMetadata);
                    self.host.emit(EventKind::DurationChange);

                    self.gate.open(|command| self.apply(command));
                    if !self.announced.swap(true, Ordering::SeqCst) {
                        self.host.emit(EventKind::RendererReady);
                    }
                    return;
                }
                Err(e) => {
                    warn!(src = %source.src, error = %e, "playlist resolution failed");
                    let (has_next, remaining) = {
                        let mut state = self.state.lock();
                        if state.index + 1 < state.sources.len() {
                            state.index += 1;
                            (true, Vec::new())
                        } else {
                            state.network_state = NetworkState::NoSource;
                            (false, state.sources.clone())
                        }
                    };
                    if !has_next {
                        self.host.emit_error(e.to_string(), remaining);
                        return;
                    }
                }
            }
        }
    }

    fn apply(&self, command: HlsCommand) {
        match command {
            HlsCommand::Load => {
                if self.state.lock().loaded {
                    self.host.emit(EventKind::LoadedData);
                    self.host.emit(EventKind::CanPlay);
                }
            }
            HlsCommand::Play => {
                if self.state.lock().loaded {
                    self.clock.play();
                    self.host.emit(EventKind::Play);
                    self.host.emit(EventKind::Playing);
                }
            }
            HlsCommand::Pause => {
                self.clock.pause();
                self.host.emit(EventKind::Pause);
            }
            HlsCommand::Seek(position) => {
                self.host.emit(EventKind::Seeking);
                self.clock.seek(position);
                self.host.emit(EventKind::Seeked);
            }
            HlsCommand::SetVolume(volume) => {
                self.state.lock().volume = volume.clamp(0.0, 1.0);
                self.host.emit(EventKind::VolumeChange);
            }
            HlsCommand::SetMuted(muted) => {
                self.state.lock().muted = muted;
                self.host.emit(EventKind::VolumeChange);
            }
            HlsCommand::SetSrc(source) => {
                {
                    let mut state = self.state.lock();
                    state.sources = vec![source];
                    state.index = 0;
                    state.loaded = false;
                    state.ended = false;
                    state.ready_state = ReadyState::Nothing;
                }
                self.clock.stop();
                self.clock.set_duration(None);
                // Re-resolve against the replacement playlist; the
                // gate is already open, so only the metadata events
                // repeat (rendererready stays once-per-instance).
                if let Some(renderer) = self.self_arc() {
                    renderer.spawn_initialize();
                }
            }
        }
    }

    /// The facade owns this instance behind an `Arc`; recover it for
    /// re-initialization tasks
    fn self_arc(&self) -> Option<Arc<Self>> {
        self.weak.upgrade()
    }
}

impl Renderer for HlsStreamRenderer {
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

    fn playback_rate(&self) -> Option<f64> {
        Some(self.clock.rate())
    }

    fn looping(&self) -> Option<bool> {
        Some(self.clock.looping())
    }

    fn buffered(&self) -> Option<TimeRanges> {
        let loaded = self.state.lock().loaded;
        if !loaded {
            return Some(TimeRanges::default());
        }
        let end = self.clock.duration().unwrap_or(0.0);
        Some(TimeRanges::new(vec![(0.0, end)]))
    }

    fn seekable(&self) -> Option<TimeRanges> {
        self.buffered()
    }

    fn current_src(&self) -> Option<String> {
        let state = self.state.lock();
        state.sources.get(state.index).map(|s| s.src.clone())
    }

    fn get_src(&self) -> Option<String> {
        self.current_src()
    }

    fn set_src(&self, source: SourceDescriptor) {
        self.gate
            .run_or_queue(HlsCommand::SetSrc(source), |c| self.apply(c));
    }

    fn load(&self) -> Result<()> {
        self.gate.run_or_queue(HlsCommand::Load, |c| self.apply(c));
        Ok(())
    }

    fn play(&self) -> Result<()> {
        self.gate.run_or_queue(HlsCommand::Play, |c| self.apply(c));
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.gate.run_or_queue(HlsCommand::Pause, |c| self.apply(c));
        Ok(())
    }

    fn can_play_type(&self, media_type: &str) -> bool {
        can_play_type(media_type)
    }

    fn stop(&self) {
        self.clock.stop();
    }

    fn set_current_time(&self, time: f64) {
        self.gate
            .run_or_queue(HlsCommand::Seek(time), |c| self.apply(c));
    }

    fn set_volume(&self, volume: f64) {
        self.gate
            .run_or_queue(HlsCommand::SetVolume(volume), |c| self.apply(c));
    }

    fn set_muted(&self, muted: bool) {
        self.gate
            .run_or_queue(HlsCommand::SetMuted(muted), |c| self.apply(c));
    }

    fn set_looping(&self, looping: bool) {
        self.clock.set_looping(looping);
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

    fn destroy(&self) {
        self.clock.stop();
    }
}

/// Registration descriptor for the HLS backend
pub fn descriptor() -> RendererDescriptor {
    RendererDescriptor::new(
        RENDERER_NAME,
        RendererCategory::StreamingPlugin,
        can_play_type,
        HlsStreamRenderer::create,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use medley_core::RecordingSink;
    use serde_json::json;

    const VOD_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:4\n\
#EXTINF:4.0,\n\
seg0.ts\n\
#EXTINF:4.0,\n\
seg1.ts\n\
#EXTINF:2.0,\n\
seg2.ts\n\
#EXT-X-ENDLIST\n";

    fn build(
        sources: Vec<SourceDescriptor>,
        manifests: serde_json::Value,
    ) -> (Arc<dyn Renderer>, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        let options = match json!({ "manifests": manifests }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let renderer = HlsStreamRenderer::create(RendererContext {
            host: sink.host(RENDERER_NAME),
            options,
            sources,
        })
        .unwrap();
        (renderer, sink)
    }

    #[test]
    fn test_capability_table() {
        assert!(can_play_type("application/x-mpegURL"));
        assert!(can_play_type("application/vnd.apple.mpegurl"));
        assert!(!can_play_type("video/mp4"));
    }

    #[test]
    fn test_sniffer_claims_m3u8_urls() {
        assert_eq!(
            sniff_url("https://cdn.example.com/live.m3u8?token=x").as_deref(),
            Some("application/x-mpegURL")
        );
        assert_eq!(sniff_url("https://cdn.example.com/movie.mp4"), None);
    }

    #[test]
    fn test_playlist_duration_sums_segments() {
        assert_eq!(playlist_duration(VOD_PLAYLIST).unwrap(), 10.0);
    }

    #[test]
    fn test_playlist_duration_rejects_master() {
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nvariant.m3u8\n";
        assert!(matches!(
            playlist_duration(master),
            Err(ManifestError::MasterPlaylist)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_ready_calls_replay_after_playlist_resolves() {
        let (renderer, sink) = build(
            vec![SourceDescriptor::new("live.m3u8", "application/x-mpegURL")],
            json!({ "live.m3u8": VOD_PLAYLIST }),
        );

        // Issued before the playlist resolves: queued, not applied.
        renderer.play().unwrap();
        renderer.set_volume(0.4);
        assert_eq!(renderer.volume(), Some(1.0));
        assert!(renderer.paused() == Some(true));

        tokio::time::sleep(Duration::from_millis(10)).await;

        // Replayed in issuance order once ready.
        let kinds = sink.kinds();
        assert_eq!(
            kinds,
            vec![
                EventKind::LoadStart,
                EventKind::LoadedMetadata,
                EventKind::DurationChange,
                EventKind::Play,
                EventKind::Playing,
                EventKind::VolumeChange,
                EventKind::RendererReady,
            ]
        );
        assert_eq!(renderer.duration(), Some(10.0));
        assert_eq!(renderer.volume(), Some(0.4));
        assert_eq!(renderer.paused(), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manifest_fallback_walks_source_list() {
        let (renderer, sink) = build(
            vec![
                SourceDescriptor::new("broken.m3u8", "application/x-mpegURL"),
                SourceDescriptor::new("good.m3u8", "application/x-mpegURL"),
            ],
            json!({
                "broken.m3u8": "not a playlist at all",
                "good.m3u8": VOD_PLAYLIST
            }),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!sink.kinds().contains(&EventKind::Error));
        assert!(sink.kinds().contains(&EventKind::RendererReady));
        assert_eq!(renderer.get_src().as_deref(), Some("good.m3u8"));
        assert_eq!(renderer.duration(), Some(10.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_manifest_fallback_escalates_error() {
        let (renderer, sink) = build(
            vec![SourceDescriptor::new("broken.m3u8", "application/x-mpegURL")],
            json!({ "broken.m3u8": "garbage" }),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;

        let events = sink.events();
        let errors: Vec<_> = events
            .iter()
            .filter(|(_, e)| e.kind == EventKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].1.sources.len(), 1);
        assert!(!sink.kinds().contains(&EventKind::RendererReady));
        assert_eq!(renderer.network_state(), Some(NetworkState::NoSource));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_src_reresolves_without_second_rendererready() {
        let (renderer, sink) = build(
            vec![SourceDescriptor::new("a.m3u8", "application/x-mpegURL")],
            json!({ "a.m3u8": VOD_PLAYLIST, "b.m3u8": VOD_PLAYLIST }),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;

        renderer.set_src(SourceDescriptor::new("b.m3u8", "application/x-mpegURL"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let ready_count = sink
            .kinds()
            .iter()
            .filter(|k| **k == EventKind::RendererReady)
            .count();
        assert_eq!(ready_count, 1);
        assert_eq!(renderer.get_src().as_deref(), Some("b.m3u8"));
        assert_eq!(renderer.duration(), Some(10.0));
    }
}
