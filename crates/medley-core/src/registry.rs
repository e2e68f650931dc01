//! Renderer registry - backend catalog and capability-based selection
//!
//! An explicit object owned by the composition root, not process-wide
//! state; tests construct a fresh registry per case.

use crate::renderer::{Renderer, RendererContext};
use crate::types::{RendererCategory, SourceDescriptor};
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Static capability predicate advertised by a backend
pub type CanPlayType = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Factory producing one renderer instance per facade session
pub type CreateRenderer =
    Arc<dyn Fn(RendererContext) -> Result<Arc<dyn Renderer>> + Send + Sync>;

/// Registration record for one backend plugin.
///
/// Identity is the `name`; registering the same name again overwrites
/// the previous descriptor in place (permissible re-registration, not
/// an error).
#[derive(Clone)]
pub struct RendererDescriptor {
    pub name: String,
    pub category: RendererCategory,
    /// Default configuration, merged under caller options at
    /// instantiation
    pub options: Map<String, Value>,
    pub can_play_type: CanPlayType,
    pub create: CreateRenderer,
}

impl RendererDescriptor {
    pub fn new<P, F>(
        name: impl Into<String>,
        category: RendererCategory,
        can_play_type: P,
        create: F,
    ) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
        F: Fn(RendererContext) -> Result<Arc<dyn Renderer>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            category,
            options: Map::new(),
            can_play_type: Arc::new(can_play_type),
            create: Arc::new(create),
        }
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }
}

impl std::fmt::Debug for RendererDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish()
    }
}

/// Winning backend/source pair returned by selection
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub renderer: String,
    pub src: SourceDescriptor,
}

/// Catalog of available backend plugins
#[derive(Default)]
pub struct RendererRegistry {
    order: Vec<String>,
    renderers: HashMap<String, RendererDescriptor>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend. An empty name is rejected; a duplicate name
    /// silently overwrites the previous descriptor while keeping its
    /// original position in the registration order.
    pub fn add(&mut self, descriptor: RendererDescriptor) -> Result<()> {
        if descriptor.name.is_empty() {
            return Err(Error::Registration(
                "descriptor must carry a non-empty `name`".into(),
            ));
        }

        debug!(name = %descriptor.name, category = %descriptor.category, "registering renderer");

        if self.renderers.insert(descriptor.name.clone(), descriptor.clone()).is_none() {
            self.order.push(descriptor.name);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RendererDescriptor> {
        self.renderers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.renderers.contains_key(name)
    }

    /// Backend names in registration order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registration order stably re-sorted by category rank: native
    /// backends first, streaming plugins second, embedded players last
    pub fn ranked_order(&self) -> Vec<String> {
        let mut ranked = self.order.clone();
        ranked.sort_by_key(|name| {
            self.renderers
                .get(name)
                .map(|d| d.category.rank())
                .unwrap_or(u8::MAX)
        });
        ranked
    }

    /// Pick the backend/source pair to play.
    ///
    /// Candidate backends are iterated in the outer loop (the caller's
    /// `preference` verbatim when non-empty, otherwise the ranked
    /// registry order) and sources in the inner loop, so a
    /// higher-priority backend capable of playing a lower-priority
    /// source beats a lower-priority backend capable of playing a
    /// higher-priority one. Returns `None` when no backend can play any
    /// candidate; the caller surfaces that as an error event.
    pub fn select(
        &self,
        sources: &[SourceDescriptor],
        preference: &[String],
    ) -> Option<Selection> {
        let candidates: Vec<String> = if preference.is_empty() {
            self.ranked_order()
        } else {
            preference.to_vec()
        };

        for name in &candidates {
            let Some(descriptor) = self.renderers.get(name) else {
                warn!(name = %name, "preference names an unregistered renderer, skipping");
                continue;
            };

            for source in sources {
                if (descriptor.can_play_type)(&source.media_type) {
                    debug!(
                        renderer = %name,
                        src = %source.src,
                        media_type = %source.media_type,
                        "renderer selected"
                    );
                    return Some(Selection {
                        renderer: name.clone(),
                        src: source.clone(),
                    });
                }
            }
        }

        None
    }
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("order", &self.order)
            .finish()
    }
}
