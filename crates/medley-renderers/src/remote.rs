//! Remote-cast renderer - the embedded third-party-player backend
//!
//! Models the family of backends whose real player lives behind an
//! out-of-process SDK: the session attaches asynchronously, every call
//! issued before attach goes through the [`ReadyGate`] apply-stack,
//! and the playhead is synthesized by polling because the upstream
//! player emits no native time events.
//!
//! Registers a URL sniffer claiming the `cast://` scheme ahead of
//! extension heuristics.

use crate::clock::PlaybackClock;
use crate::gate::ReadyGate;
use crate::progressive::MediaInfo;
use medley_core::source::mime_from_type;
use medley_core::{
    Error, EventKind, NetworkState, ReadyState, Renderer, RendererCategory, RendererContext,
    RendererDescriptor, RendererHost, Result, SourceDescriptor,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Registered backend name
pub const RENDERER_NAME: &str = "remote_cast";

/// Media type claimed by this backend
pub const CAST_MEDIA_TYPE: &str = "video/x-cast";

/// Capability predicate for the remote-cast backend
pub fn can_play_type(media_type: &str) -> bool {
    mime_from_type(media_type).eq_ignore_ascii_case(CAST_MEDIA_TYPE)
}

/// URL sniffer claiming the `cast://` scheme
pub fn sniff_url(url: &str) -> Option<String> {
    url.starts_with("cast://").then(|| CAST_MEDIA_TYPE.to_string())
}

/// Options recognized by the remote-cast backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteOptions {
    /// Simulated SDK session-attach latency
    pub attach_delay_ms: u64,
    /// When false the session never attaches (a dead receiver); the
    /// facade's init watchdog is the only way out
    pub attach: bool,
    /// Position polling cadence; each poll synthesizes a `timeupdate`
    pub poll_interval_ms: u64,
    /// Per-source playback facts reported by the receiver after attach
    pub media: HashMap<String, MediaInfo>,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            attach_delay_ms: 50,
            attach: true,
            poll_interval_ms: 250,
            media: HashMap::new(),
        }
    }
}

/// Calls deferred until the session attaches
enum RemoteCommand {
    Load,
    Play,
    Pause,
    Seek(f64),
    SetVolume(f64),
    SetMuted(bool),
    SetSrc(SourceDescriptor),
}

struct RemoteState {
    source: Option<SourceDescriptor>,
    attached: bool,
    volume: f64,
    muted: bool,
    visible: bool,
    ended: bool,
}

/// Embedded/remote playback backend with asynchronous session attach
pub struct RemoteCastRenderer {
    host: RendererHost,
    clock: PlaybackClock,
    gate: ReadyGate<RemoteCommand>,
    media: HashMap<String, MediaInfo>,
    state: Arc<Mutex<RemoteState>>,
}

impl RemoteCastRenderer {
    /// Factory wired into the renderer descriptor
    pub fn create(ctx: RendererContext) -> Result<Arc<dyn Renderer>> {
        let options: RemoteOptions = serde_json::from_value(serde_json::Value::Object(ctx.options))
            .map_err(|e| Error::InvalidConfig(format!("remote options: {e}")))?;

        let state = Arc::new(Mutex::new(RemoteState {
            source: ctx.sources.into_iter().next(),
            attached: false,
            volume: 1.0,
            muted: false,
            visible: false,
            ended: false,
        }));

        let host = ctx.host;
        let tick_host = host.clone();
        let ended_host = host.clone();
        let ended_state = Arc::clone(&state);
        let clock = PlaybackClock::new(
            Duration::from_millis(options.poll_interval_ms),
            move |_pos| tick_host.emit(EventKind::TimeUpdate),
            move || {
                ended_state.lock().ended = true;
                ended_host.emit(EventKind::Ended);
            },
        );

        let renderer = Arc::new(RemoteCastRenderer {
            host,
            clock,
            gate: ReadyGate::new(),
            media: options.media,
            state,
        });

        renderer
            .clone()
            .spawn_attach(options.attach, options.attach_delay_ms);
        Ok(renderer)
    }

    fn spawn_attach(self: Arc<Self>, attach: bool, delay_ms: u64) {
        if !attach {
            debug!("receiver configured to never attach");
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    self.on_attached();
                });
            }
            Err(_) => {
                warn!("no async runtime, cast session cannot attach");
            }
        }
    }

    /// Session attached: report the receiver's media facts, drain the
    /// apply-stack, and announce readiness
    fn on_attached(&self) {
        let source = {
            let mut state = self.state.lock();
            state.attached = true;
            state.source.clone()
        };
        if let Some(source) = &source {
            let info = self.media.get(&source.src).cloned().unwrap_or_default();
            self.clock.set_duration(info.duration);
            self.host.emit(EventKind::LoadedMetadata);
            self.host.emit(EventKind::DurationChange);
        }
        self.gate.open(|command| self.apply(command));
        self.host.emit(EventKind::RendererReady);
    }

    fn apply(&self, command: RemoteCommand) {
        match command {
            RemoteCommand::Load => {
                self.host.emit(EventKind::LoadedData);
                self.host.emit(EventKind::CanPlay);
            }
            RemoteCommand::Play => {
                self.clock.play();
                self.host.emit(EventKind::Play);
                self.host.emit(EventKind::Playing);
            }
            RemoteCommand::Pause => {
                self.clock.pause();
                self.host.emit(EventKind::Pause);
            }
            RemoteCommand::Seek(position) => {
                self.host.emit(EventKind::Seeking);
                self.clock.seek(position);
                self.host.emit(EventKind::Seeked);
            }
            RemoteCommand::SetVolume(volume) => {
                self.state.lock().volume = volume.clamp(0.0, 1.0);
                self.host.emit(EventKind::VolumeChange);
            }
            RemoteCommand::SetMuted(muted) => {
                self.state.lock().muted = muted;
                self.host.emit(EventKind::VolumeChange);
            }
            RemoteCommand::SetSrc(source) => {
                let info = self.media.get(&source.src).cloned().unwrap_or_default();
                {
                    let mut state = self.state.lock();
                    state.source = Some(source);
                    state.ended = false;
                }
                self.clock.stop();
                self.clock.set_duration(info.duration);
                self.host.emit(EventKind::LoadedMetadata);
                self.host.emit(EventKind::DurationChange);
            }
        }
    }
}

impl Renderer for RemoteCastRenderer {
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
        let attached = self.state.lock().attached;
        Some(if attached {
            NetworkState::Idle
        } else {
            NetworkState::Loading
        })
    }

    fn ready_state(&self) -> Option<ReadyState> {
        let attached = self.state.lock().attached;
        Some(if attached {
            ReadyState::Metadata
        } else {
            ReadyState::Nothing
        })
    }

    fn playback_rate(&self) -> Option<f64> {
        Some(self.clock.rate())
    }

    fn current_src(&self) -> Option<String> {
        self.state.lock().source.as_ref().map(|s| s.src.clone())
    }

    fn get_src(&self) -> Option<String> {
        self.current_src()
    }

    fn set_src(&self, source: SourceDescriptor) {
        self.gate
            .run_or_queue(RemoteCommand::SetSrc(source), |c| self.apply(c));
    }

    fn load(&self) -> Result<()> {
        self.gate.run_or_queue(RemoteCommand::Load, |c| self.apply(c));
        Ok(())
    }

    fn play(&self) -> Result<()> {
        self.gate.run_or_queue(RemoteCommand::Play, |c| self.apply(c));
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.gate.run_or_queue(RemoteCommand::Pause, |c| self.apply(c));
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
            .run_or_queue(RemoteCommand::Seek(time), |c| self.apply(c));
    }

    fn set_volume(&self, volume: f64) {
        self.gate
            .run_or_queue(RemoteCommand::SetVolume(volume), |c| self.apply(c));
    }

    fn set_muted(&self, muted: bool) {
        self.gate
            .run_or_queue(RemoteCommand::SetMuted(muted), |c| self.apply(c));
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

/// Registration descriptor for the remote-cast backend
pub fn descriptor() -> RendererDescriptor {
    RendererDescriptor::new(
        RENDERER_NAME,
        RendererCategory::Embedded,
        can_play_type,
        RemoteCastRenderer::create,
    )
}
