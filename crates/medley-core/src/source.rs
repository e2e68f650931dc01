//! Source resolution - URL to media-type normalization
//!
//! Resolution order, first match wins:
//! 1. explicit type hint from the caller
//! 2. registered custom sniffers, in registration order (backend
//!    plugins claim URL patterns ahead of extension heuristics)
//! 3. file-extension lookup with a canonical MIME table

use crate::{Error, Result};
use std::sync::Arc;
use tracing::trace;
use url::Url;

/// A custom URL sniffer: returns a media type for URLs it recognizes,
/// `None` otherwise
pub type TypeSniffer = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves raw source descriptors into normalized media types.
///
/// An explicit object rather than process-wide state: the composition
/// root owns one and hands it to the facade; tests construct a fresh
/// resolver per case.
#[derive(Clone, Default)]
pub struct SourceResolver {
    sniffers: Vec<TypeSniffer>,
    base: Option<Url>,
}

impl SourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver that absolutizes relative URLs against `base`
    pub fn with_base(base: Url) -> Self {
        Self {
            sniffers: Vec::new(),
            base: Some(base),
        }
    }

    /// Append a custom sniffer. Sniffers run in registration order,
    /// before the extension fallback.
    pub fn add_sniffer<F>(&mut self, sniffer: F)
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.sniffers.push(Arc::new(sniffer));
    }

    pub fn sniffer_count(&self) -> usize {
        self.sniffers.len()
    }

    /// Determine the media type for `url`.
    ///
    /// A non-empty `explicit` hint is returned unchanged (caller
    /// authority). Pure function over resolver state.
    pub fn resolve_type(&self, url: &str, explicit: Option<&str>) -> Result<String> {
        if let Some(hint) = explicit {
            if !hint.is_empty() {
                return Ok(hint.to_string());
            }
        }

        if url.is_empty() {
            return Err(Error::InvalidArgument("url must be non-empty".into()));
        }

        for sniffer in &self.sniffers {
            if let Some(media_type) = sniffer(url) {
                if !media_type.is_empty() {
                    trace!(url, media_type, "type resolved by sniffer");
                    return Ok(media_type);
                }
            }
        }

        Ok(type_from_extension(url))
    }

    /// Convenience: resolve only when no usable hint was given
    pub fn format_type(&self, url: &str, hint: Option<&str>) -> Result<String> {
        match hint {
            Some(h) if !h.is_empty() => Ok(h.to_string()),
            _ => self.resolve_type(url, None),
        }
    }

    /// Resolve `url` to absolute form.
    ///
    /// Absolute URLs pass through untouched. Relative URLs are joined
    /// against the configured base; with no base they are kept as-is
    /// (best effort, mirroring how an embedding host would resolve them
    /// later).
    pub fn absolutize(&self, url: &str) -> Result<String> {
        if url.is_empty() {
            return Err(Error::InvalidArgument("url must be non-empty".into()));
        }

        if Url::parse(url).is_ok() {
            return Ok(url.to_string());
        }

        match &self.base {
            Some(base) => base
                .join(url)
                .map(|joined| joined.to_string())
                .map_err(|e| Error::InvalidArgument(format!("cannot absolutize `{url}`: {e}"))),
            None => Ok(url.to_string()),
        }
    }
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("sniffers", &self.sniffers.len())
            .field("base", &self.base)
            .finish()
    }
}

/// Strip any parameter suffix from a MIME string (`video/mp4;codecs=...`
/// becomes `video/mp4`)
pub fn mime_from_type(media_type: &str) -> String {
    match media_type.find(';') {
        Some(idx) => media_type[..idx].to_string(),
        None => media_type.to_string(),
    }
}

/// Extension of the last path component, query string stripped; empty
/// when the URL has no dotted file name
pub fn get_extension(url: &str) -> String {
    let base_url = url.split('?').next().unwrap_or(url);
    let base_name = base_url
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(base_url);
    match base_name.rfind('.') {
        Some(idx) => base_name[idx + 1..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Collapse extension aliases onto their canonical container name
pub fn normalize_extension(extension: &str) -> &str {
    match extension {
        "mp4" | "m4v" => "mp4",
        "webm" | "webma" | "webmv" => "webm",
        "ogg" | "oga" | "ogv" => "ogg",
        other => other,
    }
}

// Canonical extension tables for the generic fallback. mp3 is
// intentionally absent: only sniffers or explicit hints yield
// `audio/mp3`.
const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "ogg", "webm", "flv", "mpeg", "mov"];
const AUDIO_EXTENSIONS: [&str; 4] = ["oga", "wav", "mid", "midi"];

/// Extension-based fallback mapping; unknown extensions default to the
/// generic video MIME
fn type_from_extension(url: &str) -> String {
    let ext = get_extension(url);
    let normalized = normalize_extension(&ext);

    if !normalized.is_empty() {
        if VIDEO_EXTENSIONS.contains(&normalized) {
            return format!("video/{normalized}");
        }
        if AUDIO_EXTENSIONS.contains(&normalized) {
            return format!("audio/{normalized}");
        }
    }

    "video/mp4".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping() {
        let resolver = SourceResolver::new();
        assert_eq!(resolver.resolve_type("clip.m4v", None).unwrap(), "video/mp4");
        assert_eq!(resolver.resolve_type("a.ogv", None).unwrap(), "video/ogg");
        assert_eq!(resolver.resolve_type("a.webmv", None).unwrap(), "video/webm");
        assert_eq!(resolver.resolve_type("a.mov", None).unwrap(), "video/mov");
        assert_eq!(resolver.resolve_type("a.wav", None).unwrap(), "audio/wav");
    }

    #[test]
    fn test_mp3_is_not_mapped_by_generic_fallback() {
        // The generic extension table deliberately omits mp3; without a
        // sniffer or an explicit hint it falls through to the default.
        let resolver = SourceResolver::new();
        assert_eq!(
            resolver.resolve_type("track.mp3", None).unwrap(),
            "video/mp4"
        );
    }

    #[test]
    fn test_unknown_extension_defaults_to_video_mp4() {
        let resolver = SourceResolver::new();
        assert_eq!(resolver.resolve_type("file.xyz", None).unwrap(), "video/mp4");
        assert_eq!(resolver.resolve_type("no-extension", None).unwrap(), "video/mp4");
    }

    #[test]
    fn test_query_string_stripped() {
        let resolver = SourceResolver::new();
        assert_eq!(
            resolver
                .resolve_type("https://cdn.example.com/movie.ogv?token=abc.def", None)
                .unwrap(),
            "video/ogg"
        );
    }

    #[test]
    fn test_explicit_hint_wins() {
        let resolver = SourceResolver::new();
        assert_eq!(
            resolver
                .resolve_type("track.mp3", Some("audio/mp3"))
                .unwrap(),
            "audio/mp3"
        );
        // Hint is returned unchanged, even when an extension disagrees.
        assert_eq!(
            resolver
                .resolve_type("clip.mp4", Some("application/x-custom"))
                .unwrap(),
            "application/x-custom"
        );
    }

    #[test]
    fn test_sniffer_beats_extension() {
        let mut resolver = SourceResolver::new();
        resolver.add_sniffer(|url| {
            url.contains("cast://").then(|| "video/x-cast".to_string())
        });
        resolver.add_sniffer(|url| {
            url.ends_with(".mp3").then(|| "audio/mp3".to_string())
        });

        assert_eq!(
            resolver.resolve_type("cast://device/session", None).unwrap(),
            "video/x-cast"
        );
        assert_eq!(
            resolver.resolve_type("track.mp3", None).unwrap(),
            "audio/mp3"
        );
        // Non-matching URLs still fall through to extension mapping.
        assert_eq!(resolver.resolve_type("a.webm", None).unwrap(), "video/webm");
    }

    #[test]
    fn test_sniffers_consulted_in_registration_order() {
        let mut resolver = SourceResolver::new();
        resolver.add_sniffer(|url| url.contains("stream").then(|| "first/one".to_string()));
        resolver.add_sniffer(|url| url.contains("stream").then(|| "second/one".to_string()));

        assert_eq!(
            resolver.resolve_type("https://host/stream", None).unwrap(),
            "first/one"
        );
    }

    #[test]
    fn test_empty_url_is_invalid() {
        let resolver = SourceResolver::new();
        assert!(matches!(
            resolver.resolve_type("", None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            resolver.absolutize(""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mime_from_type_strips_codecs() {
        assert_eq!(mime_from_type("video/mp4;codecs=\"avc1\""), "video/mp4");
        assert_eq!(mime_from_type("video/mp4"), "video/mp4");
    }

    #[test]
    fn test_get_extension() {
        assert_eq!(get_extension("https://a.example.com/path/movie.MP4?x=1"), "mp4");
        assert_eq!(get_extension("dir\\file.Ogv"), "ogv");
        assert_eq!(get_extension("noext"), "");
    }

    #[test]
    fn test_absolutize() {
        let base = Url::parse("https://media.example.com/videos/").unwrap();
        let resolver = SourceResolver::with_base(base);

        assert_eq!(
            resolver.absolutize("clip.mp4").unwrap(),
            "https://media.example.com/videos/clip.mp4"
        );
        assert_eq!(
            resolver.absolutize("https://other.example.com/a.mp4").unwrap(),
            "https://other.example.com/a.mp4"
        );

        // No base configured: relative URLs pass through untouched.
        let bare = SourceResolver::new();
        assert_eq!(bare.absolutize("clip.mp4").unwrap(), "clip.mp4");
    }

    #[test]
    fn test_format_type() {
        let resolver = SourceResolver::new();
        assert_eq!(
            resolver.format_type("a.mp4", Some("video/custom")).unwrap(),
            "video/custom"
        );
        assert_eq!(resolver.format_type("a.mp4", Some("")).unwrap(), "video/mp4");
        assert_eq!(resolver.format_type("a.mp4", None).unwrap(), "video/mp4");
    }
}
