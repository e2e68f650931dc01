//! Event bus - normalized playback event dispatch
//!
//! Backend-originated events are normalized into the fixed vocabulary a
//! native playback element emits, plus the core-specific
//! `rendererready` signal. Listeners are per-facade and invoked
//! synchronously in registration order.

use crate::types::SourceDescriptor;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::trace;

/// The fixed event vocabulary relayed by the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    LoadStart,
    DurationChange,
    LoadedMetadata,
    LoadedData,
    Progress,
    CanPlay,
    CanPlayThrough,
    Suspend,
    Abort,
    Error,
    Emptied,
    Stalled,
    Play,
    Playing,
    Pause,
    Waiting,
    Seeking,
    Seeked,
    TimeUpdate,
    Ended,
    RateChange,
    VolumeChange,
    Resize,
    /// Emitted once after backend instantiation completes
    RendererReady,
}

impl EventKind {
    /// Every event the facade can relay, in the canonical order
    pub const ALL: [EventKind; 24] = [
        EventKind::LoadStart,
        EventKind::DurationChange,
        EventKind::LoadedMetadata,
        EventKind::LoadedData,
        EventKind::Progress,
        EventKind::CanPlay,
        EventKind::CanPlayThrough,
        EventKind::Suspend,
        EventKind::Abort,
        EventKind::Error,
        EventKind::Emptied,
        EventKind::Stalled,
        EventKind::Play,
        EventKind::Playing,
        EventKind::Pause,
        EventKind::Waiting,
        EventKind::Seeking,
        EventKind::Seeked,
        EventKind::TimeUpdate,
        EventKind::Ended,
        EventKind::RateChange,
        EventKind::VolumeChange,
        EventKind::Resize,
        EventKind::RendererReady,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LoadStart => "loadstart",
            EventKind::DurationChange => "durationchange",
            EventKind::LoadedMetadata => "loadedmetadata",
            EventKind::LoadedData => "loadeddata",
            EventKind::Progress => "progress",
            EventKind::CanPlay => "canplay",
            EventKind::CanPlayThrough => "canplaythrough",
            EventKind::Suspend => "suspend",
            EventKind::Abort => "abort",
            EventKind::Error => "error",
            EventKind::Emptied => "emptied",
            EventKind::Stalled => "stalled",
            EventKind::Play => "play",
            EventKind::Playing => "playing",
            EventKind::Pause => "pause",
            EventKind::Waiting => "waiting",
            EventKind::Seeking => "seeking",
            EventKind::Seeked => "seeked",
            EventKind::TimeUpdate => "timeupdate",
            EventKind::Ended => "ended",
            EventKind::RateChange => "ratechange",
            EventKind::VolumeChange => "volumechange",
            EventKind::Resize => "resize",
            EventKind::RendererReady => "rendererready",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown event name `{s}`")))
    }
}

/// A normalized event delivered to facade listeners
#[derive(Debug, Clone, Serialize)]
pub struct MediaEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Error description, present on `error` events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Offending/active candidate list, present on `error` events
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceDescriptor>,
    pub timestamp: DateTime<Utc>,
}

impl MediaEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            message: None,
            sources: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>, sources: Vec<SourceDescriptor>) -> Self {
        Self {
            kind: EventKind::Error,
            message: Some(message.into()),
            sources,
            timestamp: Utc::now(),
        }
    }
}

/// Listener callback invoked synchronously on dispatch
pub type Listener = Arc<dyn Fn(&MediaEvent) + Send + Sync>;

/// Token identifying a registered listener for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Per-facade listener registry.
///
/// Dispatch is synchronous and in registration order. Listener panics
/// are not isolated: the first panic propagates to the dispatching
/// caller (documented non-goal).
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `kind`; returns a token usable with
    /// [`EventBus::remove_listener`]
    pub fn add_listener<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove one listener by token, or every listener for `kind` when
    /// no token is given. Idempotent: removing from an empty list is
    /// fine and returns `true` just like a successful removal of
    /// nothing-to-do.
    pub fn remove_listener(&mut self, kind: EventKind, id: Option<ListenerId>) -> bool {
        let Some(list) = self.listeners.get_mut(&kind) else {
            return true;
        };

        match id {
            None => {
                list.clear();
                true
            }
            Some(id) => match list.iter().position(|(lid, _)| *lid == id) {
                Some(pos) => {
                    list.remove(pos);
                    true
                }
                None => false,
            },
        }
    }

    /// Drop every listener for every event
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Snapshot the listener list for `kind` so dispatch can run
    /// without holding any registry borrow
    pub fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        self.listeners
            .get(&kind)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    /// Invoke all listeners registered for the event's kind, in
    /// registration order
    pub fn dispatch(&self, event: &MediaEvent) {
        trace!(kind = %event.kind, "dispatching event");
        for listener in self.snapshot(event.kind) {
            listener(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.listeners.len())
            .finish()
    }
}
