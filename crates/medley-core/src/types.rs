//! Core types for the Medley facade

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;

/// Unique identifier for a facade instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacadeId(pub Uuid);

impl FacadeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FacadeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FacadeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One candidate media resource, normalized by the source resolver.
///
/// Immutable once resolved. A facade session holds an ordered list of
/// these; list order is fallback order and is preserved end-to-end from
/// caller input to fallback attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Absolute URL of the resource
    pub src: String,
    /// Normalized media type (MIME-like, possibly empty)
    #[serde(rename = "type", default)]
    pub media_type: String,
    /// Opaque DRM configuration, passed through to the renderer untouched
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub drm: Option<Value>,
}

impl SourceDescriptor {
    pub fn new(src: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            media_type: media_type.into(),
            drm: None,
        }
    }

    pub fn with_drm(mut self, drm: Value) -> Self {
        self.drm = Some(drm);
        self
    }
}

/// Raw source specification as supplied by the caller, before resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub src: String,
    /// Explicit type hint; `None` or empty means "resolve from the URL"
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub drm: Option<Value>,
}

impl SourceSpec {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            media_type: None,
            drm: None,
        }
    }

    pub fn with_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

/// Accepted payloads for `MediaFacade::set_src`: a bare URL string, a
/// single source specification, or an ordered fallback list
#[derive(Debug, Clone)]
pub enum SourceInput {
    Url(String),
    Spec(SourceSpec),
    List(Vec<SourceSpec>),
}

impl From<&str> for SourceInput {
    fn from(url: &str) -> Self {
        SourceInput::Url(url.to_string())
    }
}

impl From<String> for SourceInput {
    fn from(url: String) -> Self {
        SourceInput::Url(url)
    }
}

impl From<SourceSpec> for SourceInput {
    fn from(spec: SourceSpec) -> Self {
        SourceInput::Spec(spec)
    }
}

impl From<Vec<SourceSpec>> for SourceInput {
    fn from(list: Vec<SourceSpec>) -> Self {
        SourceInput::List(list)
    }
}

/// Renderer capability family.
///
/// Used as the primary sort key when no explicit backend preference is
/// supplied: native playback ranks first, segmented-streaming plugins
/// second, embedded third-party players last. Registration order breaks
/// ties (stable sort).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererCategory {
    Native,
    StreamingPlugin,
    Embedded,
}

impl RendererCategory {
    /// Preference rank; lower wins
    pub fn rank(&self) -> u8 {
        match self {
            RendererCategory::Native => 0,
            RendererCategory::StreamingPlugin => 1,
            RendererCategory::Embedded => 2,
        }
    }
}

impl std::fmt::Display for RendererCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RendererCategory::Native => write!(f, "native"),
            RendererCategory::StreamingPlugin => write!(f, "streaming-plugin"),
            RendererCategory::Embedded => write!(f, "embedded"),
        }
    }
}

/// Network activity state, mirroring the native media element codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    Empty,
    Idle,
    Loading,
    NoSource,
}

impl NetworkState {
    pub fn code(&self) -> u8 {
        match self {
            NetworkState::Empty => 0,
            NetworkState::Idle => 1,
            NetworkState::Loading => 2,
            NetworkState::NoSource => 3,
        }
    }
}

/// Readiness of the current playback position, mirroring the native
/// media element codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    Nothing,
    Metadata,
    CurrentData,
    FutureData,
    EnoughData,
}

impl ReadyState {
    pub fn code(&self) -> u8 {
        match self {
            ReadyState::Nothing => 0,
            ReadyState::Metadata => 1,
            ReadyState::CurrentData => 2,
            ReadyState::FutureData => 3,
            ReadyState::EnoughData => 4,
        }
    }
}

/// Preload hint forwarded to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    None,
    Metadata,
    Auto,
}

impl Default for Preload {
    fn default() -> Self {
        Preload::None
    }
}

/// Buffered/played/seekable time ranges in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRanges {
    ranges: Vec<(f64, f64)>,
}

impl TimeRanges {
    pub fn new(ranges: Vec<(f64, f64)>) -> Self {
        Self { ranges }
    }

    pub fn length(&self) -> usize {
        self.ranges.len()
    }

    pub fn start(&self, index: usize) -> Option<f64> {
        self.ranges.get(index).map(|r| r.0)
    }

    pub fn end(&self, index: usize) -> Option<f64> {
        self.ranges.get(index).map(|r| r.1)
    }

    pub fn contains(&self, time: f64) -> bool {
        self.ranges.iter().any(|(s, e)| time >= *s && time <= *e)
    }
}

/// Facade configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacadeConfig {
    /// Explicit backend-name preference order; empty means "use the
    /// registry order ranked by category"
    pub renderers: Vec<String>,
    /// Deadline for a renderer to signal readiness after creation;
    /// `None` disables the watchdog
    pub init_timeout_ms: Option<u64>,
    /// Base URL used to absolutize relative source URLs
    pub base_url: Option<Url>,
    /// Caller-supplied options merged over each renderer's defaults at
    /// instantiation time
    pub renderer_options: Map<String, Value>,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            renderers: Vec::new(),
            init_timeout_ms: Some(10_000),
            base_url: None,
            renderer_options: Map::new(),
        }
    }
}

/// Record of the original embed point a facade manages.
///
/// The facade takes the placeholder over on creation and restores it on
/// `destroy`; there is no DOM here, only the recorded identity and
/// source list of the thing being wrapped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Placeholder {
    /// Identifier of the embed point
    pub id: String,
    /// Recorded current source (first candidate of the last `set_src`)
    pub src: Option<String>,
    /// Sources present on the placeholder before the facade took over
    pub sources: Vec<SourceDescriptor>,
}

impl Placeholder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            src: None,
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<SourceDescriptor>) -> Self {
        self.sources = sources;
        self
    }
}
