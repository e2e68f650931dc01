//! Medley Renderers - reference backends for the Medley facade
//!
//! Three backend families exercising the full renderer contract:
//! - [`progressive`]: native-element-style progressive playback,
//!   synchronously ready, clock-driven, with in-backend multi-source
//!   fallback
//! - [`hls`]: segmented streaming over HLS media playlists, ready only
//!   once the playlist resolves
//! - [`remote`]: an embedded/remote player behind an asynchronously
//!   attaching SDK session, playhead synthesized by polling
//!
//! The asynchronous backends share one apply-stack implementation
//! ([`gate::ReadyGate`]): calls issued before readiness queue and
//! replay in issuance order on the ready transition.
//!
//! Everything here consumes only the public plugin API of
//! `medley-core`; registering through [`register_defaults`] is exactly
//! what an out-of-tree backend would do.

pub mod clock;
pub mod gate;
#[cfg(feature = "hls")]
pub mod hls;
pub mod progressive;
#[cfg(feature = "remote")]
pub mod remote;

pub use clock::PlaybackClock;
pub use gate::ReadyGate;

use medley_core::{RendererRegistry, Result, SourceResolver};

/// Register every built-in backend and its URL sniffers
pub fn register_defaults(
    registry: &mut RendererRegistry,
    resolver: &mut SourceResolver,
) -> Result<()> {
    registry.add(progressive::descriptor())?;

    #[cfg(feature = "hls")]
    {
        registry.add(hls::descriptor())?;
        resolver.add_sniffer(hls::sniff_url);
    }

    #[cfg(feature = "remote")]
    {
        registry.add(remote::descriptor())?;
        resolver.add_sniffer(remote::sniff_url);
    }

    Ok(())
}
