//! Media facade - the uniform playback object handed to callers
//!
//! Proxies a fixed property/method surface onto whichever renderer
//! backend is currently active, owns the renderer lifecycle (selection,
//! swapping, teardown) and the event bus, and defers caller-issued
//! method calls while backend initialization is outstanding, replaying
//! them in issuance order once every pending initialization settles.

use crate::events::{EventBus, EventKind, ListenerId, MediaEvent};
use crate::registry::RendererRegistry;
use crate::renderer::{EventSink, Renderer, RendererContext, RendererHost};
use crate::source::SourceResolver;
use crate::types::{
    FacadeConfig, FacadeId, NetworkState, Placeholder, Preload, ReadyState, SourceDescriptor,
    SourceInput, SourceSpec, TimeRanges,
};
use crate::{Error, Result};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

/// Callback fired once after construction-time setup settles
pub type SetupCallback = Box<dyn Fn(&MediaFacade) + Send + Sync>;

/// Optional success/error callbacks supplied at construction
#[derive(Default)]
pub struct SetupCallbacks {
    pub success: Option<SetupCallback>,
    pub error: Option<SetupCallback>,
}

impl SetupCallbacks {
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MediaFacade) + Send + Sync + 'static,
    {
        self.success = Some(Box::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MediaFacade) + Send + Sync + 'static,
    {
        self.error = Some(Box::new(callback));
        self
    }
}

/// A method call deferred while backend initialization is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueuedCall {
    Load,
    Play,
    Pause,
}

struct FacadeState {
    /// Renderer cache, insertion-ordered; grows monotonically during a
    /// session (instances are reused, never recreated)
    renderers: Vec<(String, Arc<dyn Renderer>)>,
    /// Name of the active renderer; at most one at a time
    active: Option<String>,
    /// Candidate list of the most recent `set_src`, in fallback order
    media_files: Vec<SourceDescriptor>,
    placeholder: Placeholder,
    original: Placeholder,
    /// Renderers created but not yet ready, with their watchdog
    /// generation
    outstanding: Vec<(String, u64)>,
    /// Readiness signals that arrived while their renderer's create
    /// call was still on the stack
    early_ready: Vec<String>,
    /// Deferred method calls, in issuance order
    queue: Vec<QueuedCall>,
    had_error: bool,
    init_failed: bool,
    setup_dispatched: bool,
    destroyed: bool,
    next_generation: u64,
}

struct FacadeShared {
    id: FacadeId,
    config: FacadeConfig,
    registry: Arc<RendererRegistry>,
    resolver: Arc<SourceResolver>,
    state: Mutex<FacadeState>,
    bus: Mutex<EventBus>,
    callbacks: SetupCallbacks,
    self_weak: Weak<FacadeShared>,
}

impl EventSink for FacadeShared {
    fn renderer_event(&self, renderer: &str, event: MediaEvent) {
        if let Some(shared) = self.self_weak.upgrade() {
            MediaFacade { shared }.handle_renderer_event(renderer, event);
        }
    }
}

/// The public facade object. Cheap to clone; all clones share the same
/// session state.
pub struct MediaFacade {
    shared: Arc<FacadeShared>,
}

impl Clone for MediaFacade {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl std::fmt::Debug for MediaFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFacade")
            .field("id", &self.shared.id)
            .field("active", &self.renderer_name())
            .finish()
    }
}

impl MediaFacade {
    /// Create a facade over `placeholder`.
    ///
    /// If the placeholder carries sources, renderer selection runs
    /// immediately; the `callbacks` fire once after that initial setup
    /// settles (including any asynchronous backend initialization).
    pub fn create(
        placeholder: Placeholder,
        config: FacadeConfig,
        registry: Arc<RendererRegistry>,
        resolver: Arc<SourceResolver>,
        callbacks: SetupCallbacks,
    ) -> Result<MediaFacade> {
        if config.renderers.iter().any(String::is_empty) {
            return Err(Error::InvalidConfig(
                "renderer preference list must not contain empty names".into(),
            ));
        }

        let shared = Arc::new_cyclic(|self_weak| FacadeShared {
            id: FacadeId::new(),
            config,
            registry,
            resolver,
            state: Mutex::new(FacadeState {
                renderers: Vec::new(),
                active: None,
                media_files: Vec::new(),
                placeholder: placeholder.clone(),
                original: placeholder,
                outstanding: Vec::new(),
                early_ready: Vec::new(),
                queue: Vec::new(),
                had_error: false,
                init_failed: false,
                setup_dispatched: false,
                destroyed: false,
                next_generation: 0,
            }),
            bus: Mutex::new(EventBus::new()),
            callbacks,
            self_weak: self_weak.clone(),
        });

        let facade = MediaFacade { shared };
        info!(id = %facade.shared.id, "facade created");

        let initial = facade.shared.state.lock().placeholder.sources.clone();
        if !initial.is_empty() {
            let specs = initial
                .into_iter()
                .map(|d| SourceSpec {
                    src: d.src,
                    media_type: (!d.media_type.is_empty()).then_some(d.media_type),
                    drm: d.drm,
                })
                .collect::<Vec<_>>();
            facade.set_src(SourceInput::List(specs));
        }

        facade.maybe_dispatch_setup();
        Ok(facade)
    }

    pub fn id(&self) -> FacadeId {
        self.shared.id
    }

    /// Name of the currently active renderer backend
    pub fn renderer_name(&self) -> Option<String> {
        self.shared.state.lock().active.clone()
    }

    /// Names of every cached renderer instance, in creation order
    pub fn cached_renderer_names(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .renderers
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Snapshot of the managed placeholder record
    pub fn placeholder(&self) -> Placeholder {
        self.shared.state.lock().placeholder.clone()
    }

    /// Whether an error event has been generated on this facade
    pub fn had_error(&self) -> bool {
        self.shared.state.lock().had_error
    }

    // ------------------------------------------------------------------
    // Event subsystem
    // ------------------------------------------------------------------

    pub fn add_event_listener<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        self.shared.bus.lock().add_listener(kind, callback)
    }

    /// Remove one listener by token, or clear the whole list for `kind`
    /// when no token is given. Idempotent.
    pub fn remove_event_listener(&self, kind: EventKind, id: Option<ListenerId>) -> bool {
        self.shared.bus.lock().remove_listener(kind, id)
    }

    /// Drop every listener for every event
    pub fn remove_all_listeners(&self) {
        self.shared.bus.lock().clear();
    }

    /// Invoke all listeners registered for the event's kind, in
    /// registration order, synchronously
    pub fn dispatch_event(&self, event: &MediaEvent) {
        let listeners = self.shared.bus.lock().snapshot(event.kind);
        for listener in listeners {
            listener(event);
        }
    }

    /// Construct and dispatch an `error` event carrying `message` and
    /// the offending source list, and flag the facade as errored
    pub fn generate_error(&self, message: impl Into<String>, sources: Vec<SourceDescriptor>) {
        let message = message.into();
        warn!(id = %self.shared.id, message, "playback error");
        self.shared.state.lock().had_error = true;
        self.dispatch_event(&MediaEvent::error(message, sources));
    }

    // ------------------------------------------------------------------
    // Source handling
    // ------------------------------------------------------------------

    /// The active renderer's reported source
    pub fn src(&self) -> Option<String> {
        self.active_renderer().and_then(|r| r.get_src())
    }

    /// Replace the session's source list.
    ///
    /// Accepts a bare URL, a single spec, or an ordered fallback list.
    /// Each entry is absolutized and type-resolved, current playback is
    /// paused (with a `pause` event) if running, and the registry picks
    /// the backend to swap to. A failed selection over a non-empty
    /// source raises a single `error` event with message
    /// `"No renderer found"` and the candidate list attached.
    pub fn set_src(&self, input: impl Into<SourceInput>) {
        if self.shared.state.lock().destroyed {
            return;
        }

        let media_files = match self.normalize(input.into()) {
            Ok(files) => files,
            Err(e) => {
                self.generate_error(e.to_string(), Vec::new());
                return;
            }
        };

        if self.paused() == Some(false) {
            self.pause();
            self.dispatch_event(&MediaEvent::new(EventKind::Pause));
        }

        let first_src = media_files[0].src.clone();
        {
            let mut state = self.shared.state.lock();
            state.media_files = media_files.clone();
            state.placeholder.src = Some(first_src.clone());
        }

        let selection = self
            .shared
            .registry
            .select(&media_files, &self.shared.config.renderers);

        match selection {
            None => {
                if !first_src.is_empty() {
                    self.generate_error(Error::NoRendererFound.to_string(), media_files);
                }
            }
            Some(selection) => {
                if !first_src.is_empty() {
                    self.change_renderer(&selection.renderer, media_files);
                }
            }
        }
    }

    /// Normalize caller input into resolved, absolutized descriptors,
    /// preserving list order end-to-end
    fn normalize(&self, input: SourceInput) -> Result<Vec<SourceDescriptor>> {
        let specs = match input {
            SourceInput::Url(url) if url.is_empty() => {
                return Ok(vec![SourceDescriptor::new("", "")])
            }
            SourceInput::Url(url) => vec![SourceSpec::new(url)],
            SourceInput::Spec(spec) => vec![spec],
            SourceInput::List(list) if list.is_empty() => {
                return Ok(vec![SourceDescriptor::new("", "")])
            }
            SourceInput::List(list) => list,
        };

        let resolver = &self.shared.resolver;
        let mut files = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.src.is_empty() {
                files.push(SourceDescriptor {
                    src: String::new(),
                    media_type: spec.media_type.unwrap_or_default(),
                    drm: spec.drm,
                });
                continue;
            }
            let src = resolver.absolutize(&spec.src)?;
            let media_type = resolver.resolve_type(&src, spec.media_type.as_deref())?;
            files.push(SourceDescriptor {
                src,
                media_type,
                drm: spec.drm,
            });
        }
        Ok(files)
    }

    // ------------------------------------------------------------------
    // Renderer lifecycle
    // ------------------------------------------------------------------

    /// Swap the active backend to `name`, feeding it `sources`.
    ///
    /// Reuses the instance in place when `name` is already active,
    /// revives a cached instance when one exists, and otherwise
    /// instantiates the backend with merged default+caller options.
    /// The previous active renderer is paused/stopped/hidden but kept
    /// cached for later reuse. Returns `false` only when `name` is not
    /// resolvable in the configured preference order.
    #[instrument(skip(self, sources), fields(id = %self.shared.id))]
    pub fn change_renderer(&self, name: &str, sources: Vec<SourceDescriptor>) -> bool {
        enum SwapPath {
            SameActive(Arc<dyn Renderer>),
            Cached {
                instance: Arc<dyn Renderer>,
                old: Option<Arc<dyn Renderer>>,
            },
            Create {
                old: Option<Arc<dyn Renderer>>,
                generation: u64,
            },
        }

        let first_source = sources.first().cloned();
        let path = {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return false;
            }
            state.media_files = sources.clone();

            if state.active.as_deref() == Some(name) {
                let instance = state
                    .renderers
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, r)| Arc::clone(r));
                match instance {
                    Some(instance) => SwapPath::SameActive(instance),
                    None => return false,
                }
            } else {
                let old = state.active.as_ref().and_then(|active| {
                    state
                        .renderers
                        .iter()
                        .find(|(n, _)| n == active)
                        .map(|(_, r)| Arc::clone(r))
                });
                let cached = state
                    .renderers
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, r)| Arc::clone(r));
                match cached {
                    Some(instance) => {
                        state.active = Some(name.to_string());
                        SwapPath::Cached { instance, old }
                    }
                    None => {
                        // The requested name must be resolvable in the
                        // configured preference order.
                        let order: Vec<String> = if self.shared.config.renderers.is_empty() {
                            self.shared.registry.order().to_vec()
                        } else {
                            self.shared.config.renderers.clone()
                        };
                        if !order.iter().any(|n| n == name) {
                            warn!(renderer = name, "renderer not in configured order");
                            return false;
                        }
                        state.next_generation += 1;
                        let generation = state.next_generation;
                        state.outstanding.push((name.to_string(), generation));
                        SwapPath::Create { old, generation }
                    }
                }
            }
        };

        match path {
            SwapPath::SameActive(instance) => {
                debug!(renderer = name, "reusing active renderer in place");
                let _ = instance.pause();
                instance.stop();
                instance.show();
                if let Some(source) = first_source {
                    instance.set_src(source);
                }
                true
            }
            SwapPath::Cached { instance, old } => {
                debug!(renderer = name, "reviving cached renderer");
                if let Some(old) = old {
                    let _ = old.pause();
                    old.stop();
                    old.hide();
                }
                instance.show();
                if let Some(source) = first_source {
                    instance.set_src(source);
                }
                true
            }
            SwapPath::Create { old, generation } => {
                if let Some(old) = old {
                    let _ = old.pause();
                    old.stop();
                    old.hide();
                }
                self.instantiate(name, sources, generation)
            }
        }
    }

    /// Create, cache, and activate a renderer instance for `name`
    fn instantiate(&self, name: &str, sources: Vec<SourceDescriptor>, generation: u64) -> bool {
        let Some(descriptor) = self.shared.registry.get(name).cloned() else {
            let mut state = self.shared.state.lock();
            state.outstanding.retain(|(n, g)| !(n == name && *g == generation));
            warn!(renderer = name, "renderer not registered");
            return false;
        };

        // Renderer defaults first, caller options on top.
        let mut options: Map<String, Value> = descriptor.options.clone();
        for (key, value) in &self.shared.config.renderer_options {
            options.insert(key.clone(), value.clone());
        }

        let host = RendererHost::new(self.shared.self_weak.clone(), name);
        let context = RendererContext {
            host,
            options,
            sources,
        };

        let instance = match (descriptor.create)(context) {
            Ok(instance) => instance,
            Err(e) => {
                let files = {
                    let mut state = self.shared.state.lock();
                    state
                        .outstanding
                        .retain(|(n, g)| !(n == name && *g == generation));
                    state.init_failed = true;
                    state.media_files.clone()
                };
                self.generate_error(e.to_string(), files);
                self.maybe_dispatch_setup();
                return false;
            }
        };

        let (was_early, drained) = {
            let mut state = self.shared.state.lock();
            state.renderers.push((name.to_string(), Arc::clone(&instance)));
            state.active = Some(name.to_string());

            let was_early = if let Some(pos) = state.early_ready.iter().position(|n| n == name) {
                state.early_ready.remove(pos);
                state
                    .outstanding
                    .retain(|(n, g)| !(n == name && *g == generation));
                true
            } else {
                false
            };
            let drained = if was_early && state.outstanding.is_empty() && !state.init_failed {
                std::mem::take(&mut state.queue)
            } else {
                Vec::new()
            };
            (was_early, drained)
        };

        info!(renderer = name, ready = was_early, "renderer instantiated");
        instance.show();

        if was_early {
            self.dispatch_event(&MediaEvent::new(EventKind::RendererReady));
            for call in drained {
                self.invoke_now(call);
            }
        } else {
            self.arm_watchdog(name.to_string(), generation);
        }
        self.maybe_dispatch_setup();
        true
    }

    /// Forward a resize to the active renderer
    pub fn set_size(&self, width: u32, height: u32) {
        if let Some(renderer) = self.active_renderer() {
            renderer.set_size(width, height);
        }
    }

    /// Tear the facade down: every cached renderer instance is
    /// destroyed (active or not) and the original placeholder record is
    /// restored
    #[instrument(skip(self), fields(id = %self.shared.id))]
    pub fn destroy(&self) {
        let (instances, active) = {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.queue.clear();
            state.outstanding.clear();
            let active = state.active.take().and_then(|name| {
                state
                    .renderers
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, r)| Arc::clone(r))
            });
            let instances: Vec<Arc<dyn Renderer>> = state
                .renderers
                .drain(..)
                .map(|(_, r)| r)
                .collect();
            state.placeholder = state.original.clone();
            (instances, active)
        };

        if let Some(active) = active {
            let _ = active.pause();
            active.hide();
        }
        for instance in &instances {
            instance.destroy();
        }
        self.shared.bus.lock().clear();
        info!(renderers = instances.len(), "facade destroyed");
    }

    // ------------------------------------------------------------------
    // Method proxying
    // ------------------------------------------------------------------

    pub fn load(&self) {
        self.proxy_call(QueuedCall::Load);
    }

    pub fn play(&self) {
        self.proxy_call(QueuedCall::Play);
    }

    pub fn pause(&self) {
        self.proxy_call(QueuedCall::Pause);
    }

    /// Capability query against the active renderer; `false` when none
    /// is active. Answered immediately, never deferred: a pure query
    /// has no meaningful replay.
    pub fn can_play_type(&self, media_type: &str) -> bool {
        self.active_renderer()
            .map(|r| r.can_play_type(media_type))
            .unwrap_or(false)
    }

    fn proxy_call(&self, call: QueuedCall) {
        let target = {
            let mut state = self.shared.state.lock();
            if state.destroyed || state.active.is_none() {
                return;
            }
            if !state.outstanding.is_empty() {
                trace!(?call, "renderer initializing, call queued");
                state.queue.push(call);
                return;
            }
            let active = state.active.clone().unwrap_or_default();
            state
                .renderers
                .iter()
                .find(|(n, _)| *n == active)
                .map(|(_, r)| Arc::clone(r))
        };
        if let Some(target) = target {
            self.invoke_on(target, call);
        }
    }

    fn invoke_now(&self, call: QueuedCall) {
        if let Some(target) = self.active_renderer() {
            self.invoke_on(target, call);
        }
    }

    fn invoke_on(&self, target: Arc<dyn Renderer>, call: QueuedCall) {
        let result = match call {
            QueuedCall::Load => target.load(),
            QueuedCall::Play => target.play(),
            QueuedCall::Pause => target.pause(),
        };
        if let Err(e) = result {
            let files = self.shared.state.lock().media_files.clone();
            self.generate_error(e.to_string(), files);
        }
    }

    // ------------------------------------------------------------------
    // Property proxying (static delegation, one method per property)
    // ------------------------------------------------------------------

    fn active_renderer(&self) -> Option<Arc<dyn Renderer>> {
        let state = self.shared.state.lock();
        let active = state.active.as_deref()?;
        state
            .renderers
            .iter()
            .find(|(n, _)| n == active)
            .map(|(_, r)| Arc::clone(r))
    }

    pub fn current_time(&self) -> Option<f64> {
        self.active_renderer().and_then(|r| r.current_time())
    }

    pub fn duration(&self) -> Option<f64> {
        self.active_renderer().and_then(|r| r.duration())
    }

    pub fn volume(&self) -> Option<f64> {
        self.active_renderer().and_then(|r| r.volume())
    }

    pub fn muted(&self) -> Option<bool> {
        self.active_renderer().and_then(|r| r.muted())
    }

    pub fn paused(&self) -> Option<bool> {
        self.active_renderer().and_then(|r| r.paused())
    }

    pub fn ended(&self) -> Option<bool> {
        self.active_renderer().and_then(|r| r.ended())
    }

    pub fn seeking(&self) -> Option<bool> {
        self.active_renderer().and_then(|r| r.seeking())
    }

    pub fn network_state(&self) -> Option<NetworkState> {
        self.active_renderer().and_then(|r| r.network_state())
    }

    pub fn ready_state(&self) -> Option<ReadyState> {
        self.active_renderer().and_then(|r| r.ready_state())
    }

    pub fn video_width(&self) -> Option<u32> {
        self.active_renderer().and_then(|r| r.video_width())
    }

    pub fn video_height(&self) -> Option<u32> {
        self.active_renderer().and_then(|r| r.video_height())
    }

    pub fn playback_rate(&self) -> Option<f64> {
        self.active_renderer().and_then(|r| r.playback_rate())
    }

    pub fn default_playback_rate(&self) -> Option<f64> {
        self.active_renderer().and_then(|r| r.default_playback_rate())
    }

    pub fn looping(&self) -> Option<bool> {
        self.active_renderer().and_then(|r| r.looping())
    }

    pub fn autoplay(&self) -> Option<bool> {
        self.active_renderer().and_then(|r| r.autoplay())
    }

    pub fn controls(&self) -> Option<bool> {
        self.active_renderer().and_then(|r| r.controls())
    }

    pub fn preload(&self) -> Option<Preload> {
        self.active_renderer().and_then(|r| r.preload())
    }

    pub fn buffered(&self) -> Option<TimeRanges> {
        self.active_renderer().and_then(|r| r.buffered())
    }

    pub fn seekable(&self) -> Option<TimeRanges> {
        self.active_renderer().and_then(|r| r.seekable())
    }

    pub fn current_src(&self) -> Option<String> {
        self.active_renderer().and_then(|r| r.current_src())
    }

    pub fn set_current_time(&self, time: f64) {
        if let Some(r) = self.active_renderer() {
            r.set_current_time(time);
        }
    }

    pub fn set_volume(&self, volume: f64) {
        if let Some(r) = self.active_renderer() {
            r.set_volume(volume);
        }
    }

    pub fn set_muted(&self, muted: bool) {
        if let Some(r) = self.active_renderer() {
            r.set_muted(muted);
        }
    }

    pub fn set_playback_rate(&self, rate: f64) {
        if let Some(r) = self.active_renderer() {
            r.set_playback_rate(rate);
        }
    }

    pub fn set_default_playback_rate(&self, rate: f64) {
        if let Some(r) = self.active_renderer() {
            r.set_default_playback_rate(rate);
        }
    }

    pub fn set_looping(&self, looping: bool) {
        if let Some(r) = self.active_renderer() {
            r.set_looping(looping);
        }
    }

    pub fn set_autoplay(&self, autoplay: bool) {
        if let Some(r) = self.active_renderer() {
            r.set_autoplay(autoplay);
        }
    }

    pub fn set_controls(&self, controls: bool) {
        if let Some(r) = self.active_renderer() {
            r.set_controls(controls);
        }
    }

    pub fn set_preload(&self, preload: Preload) {
        if let Some(r) = self.active_renderer() {
            r.set_preload(preload);
        }
    }

    // ------------------------------------------------------------------
    // Renderer-originated event handling
    // ------------------------------------------------------------------

    fn handle_renderer_event(&self, renderer: &str, event: MediaEvent) {
        match event.kind {
            EventKind::RendererReady => self.on_renderer_ready(renderer),
            EventKind::Error => {
                let relay = {
                    let mut state = self.shared.state.lock();
                    if state.destroyed {
                        return;
                    }
                    let is_active = state.active.as_deref() == Some(renderer);
                    let initializing = state
                        .outstanding
                        .iter()
                        .position(|(n, _)| n == renderer);
                    if let Some(pos) = initializing {
                        // Initialization failure: settle the entry,
                        // drop every deferred call.
                        state.outstanding.remove(pos);
                        state.init_failed = true;
                        state.queue.clear();
                    }
                    if is_active || initializing.is_some() {
                        state.had_error = true;
                        true
                    } else {
                        false
                    }
                };
                if relay {
                    self.dispatch_event(&event);
                    self.maybe_dispatch_setup();
                } else {
                    debug!(renderer, "error from inactive renderer dropped");
                }
            }
            _ => {
                let is_active = {
                    let state = self.shared.state.lock();
                    !state.destroyed && state.active.as_deref() == Some(renderer)
                };
                if is_active {
                    self.dispatch_event(&event);
                } else {
                    trace!(renderer, kind = %event.kind, "event from inactive renderer dropped");
                }
            }
        }
    }

    fn on_renderer_ready(&self, renderer: &str) {
        enum ReadyAction {
            Settled {
                is_active: bool,
                drained: Vec<QueuedCall>,
            },
            Late {
                is_active: bool,
            },
        }

        let action = {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return;
            }
            if !state.renderers.iter().any(|(n, _)| n == renderer) {
                // Ready fired while this renderer's create call was
                // still on the stack; consumed once it is cached and
                // activated, so the facade-level signal is never
                // misattributed.
                if state.outstanding.iter().any(|(n, _)| n == renderer) {
                    state.early_ready.push(renderer.to_string());
                }
                return;
            }
            if let Some(pos) = state.outstanding.iter().position(|(n, _)| n == renderer) {
                state.outstanding.remove(pos);
                let drained = if state.outstanding.is_empty() && !state.init_failed {
                    std::mem::take(&mut state.queue)
                } else {
                    Vec::new()
                };
                ReadyAction::Settled {
                    is_active: state.active.as_deref() == Some(renderer),
                    drained,
                }
            } else {
                ReadyAction::Late {
                    is_active: state.active.as_deref() == Some(renderer),
                }
            }
        };

        match action {
            ReadyAction::Settled { is_active, drained } => {
                if is_active {
                    self.dispatch_event(&MediaEvent::new(EventKind::RendererReady));
                } else {
                    debug!(renderer, "superseded renderer ready, instance cached only");
                }
                for call in drained {
                    self.invoke_now(call);
                }
                self.maybe_dispatch_setup();
            }
            ReadyAction::Late { is_active } => {
                if is_active {
                    self.dispatch_event(&MediaEvent::new(EventKind::RendererReady));
                }
            }
        }
    }

    /// Fire the construction callbacks once every pending
    /// initialization has settled
    fn maybe_dispatch_setup(&self) {
        let flags = {
            let mut state = self.shared.state.lock();
            if state.setup_dispatched || state.destroyed || !state.outstanding.is_empty() {
                None
            } else {
                state.setup_dispatched = true;
                Some((state.init_failed, state.had_error))
            }
        };
        if let Some((init_failed, had_error)) = flags {
            if !init_failed {
                if let Some(callback) = &self.shared.callbacks.success {
                    callback(self);
                }
            }
            if had_error {
                if let Some(callback) = &self.shared.callbacks.error {
                    callback(self);
                }
            }
        }
    }

    /// Deadline for a created renderer to signal readiness; firing
    /// drops the deferred-call queue and raises an `error` event
    fn arm_watchdog(&self, renderer: String, generation: u64) {
        let Some(timeout_ms) = self.shared.config.init_timeout_ms else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(renderer, "no async runtime, init watchdog disarmed");
            return;
        };
        let weak = Arc::downgrade(&self.shared);
        handle.spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            if let Some(shared) = weak.upgrade() {
                MediaFacade { shared }.on_init_timeout(&renderer, generation, timeout_ms);
            }
        });
    }

    fn on_init_timeout(&self, renderer: &str, generation: u64, timeout_ms: u64) {
        let files = {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return;
            }
            let Some(pos) = state
                .outstanding
                .iter()
                .position(|(n, g)| n == renderer && *g == generation)
            else {
                return;
            };
            state.outstanding.remove(pos);
            state.init_failed = true;
            state.queue.clear();
            state.media_files.clone()
        };

        warn!(renderer, timeout_ms, "renderer init timed out");
        let error = Error::BackendInitTimeout {
            renderer: renderer.to_string(),
            timeout_ms,
        };
        self.generate_error(error.to_string(), files);
        self.maybe_dispatch_setup();
    }
}
