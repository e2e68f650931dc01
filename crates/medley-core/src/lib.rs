//! Medley Core - Backend-agnostic media playback facade
//!
//! This crate provides the orchestration layer for media playback:
//! - Capability-based renderer selection over candidate source lists
//! - Transparent property/method proxying onto the active backend
//! - Renderer hot-swapping with instance caching and clean teardown
//! - Normalization of backend event streams into one event contract
//! - Deferred-call replay across asynchronous backend initialization
//!
//! Medley performs no decoding or rendering itself; it only decides
//! which backend plugin does, and relays that backend's state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Medley Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │    Source    │  │   Renderer   │  │   Renderer   │           │
//! │  │   Resolver   │  │   Registry   │  │   Contract   │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │    Media    │                              │
//! │                    │   Facade    │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │                    ┌──────┴──────┐       ┌──────────────┐       │
//! │                    │    Event    │──────>│   Listeners  │       │
//! │                    │     Bus     │       │  (external)  │       │
//! │                    └─────────────┘       └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Backend plugins register a [`registry::RendererDescriptor`] and
//! implement [`renderer::Renderer`] for their per-session instances;
//! callers only ever touch the [`facade::MediaFacade`].

pub mod error;
pub mod events;
pub mod facade;
pub mod registry;
pub mod renderer;
pub mod source;
pub mod types;

pub use error::{Error, Result};
pub use events::{EventBus, EventKind, Listener, ListenerId, MediaEvent};
pub use facade::{MediaFacade, SetupCallback, SetupCallbacks};
pub use registry::{CanPlayType, CreateRenderer, RendererDescriptor, RendererRegistry, Selection};
pub use renderer::{EventSink, RecordingSink, Renderer, RendererContext, RendererHost};
pub use source::{get_extension, mime_from_type, normalize_extension, SourceResolver, TypeSniffer};
pub use types::{
    FacadeConfig, FacadeId, NetworkState, Placeholder, Preload, ReadyState, RendererCategory,
    SourceDescriptor, SourceInput, SourceSpec, TimeRanges,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the facade library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Medley Core initialized");
}
