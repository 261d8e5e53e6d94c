//! Secondary media surface abstraction.
//!
//! The secondary surface is an embedded, muted video element that must stay
//! frame-accurate with the server's audio clock. The drift correction loop
//! drives it exclusively through this trait.

use async_trait::async_trait;
use thiserror::Error;

/// Reported play state of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePlayState {
    /// Content loaded (or cued) but playback never started.
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
}

impl SurfacePlayState {
    /// Whether the surface is actively advancing its own clock.
    pub fn is_playing(self) -> bool {
        matches!(self, SurfacePlayState::Playing)
    }
}

/// Errors reported by a secondary surface.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// The content can never play on this surface (e.g. embedding disabled
    /// by the owner). The drift loop disables the surface for this content
    /// id for the rest of the session; there is no retry.
    #[error("Content not playable on surface: {0}")]
    Fatal(String),

    /// A temporary failure (not ready yet, transient API error). The drift
    /// loop logs it and tries again on the next snapshot.
    #[error("Transient surface error: {0}")]
    Transient(String),
}

impl SurfaceError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SurfaceError::Fatal(_))
    }
}

pub type Result<T> = std::result::Result<T, SurfaceError>;

/// A synchronized video surface.
///
/// Implementations wrap whatever the host provides (an IFrame player or a
/// native video view) and must accept commands after `load` resolves.
/// All methods are cheap; none may block the event loop.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait SecondarySurface: Send + Sync {
    /// Cue content by id without starting playback.
    async fn load(&self, media_id: &str) -> Result<()>;

    /// The surface's own playback position, in seconds.
    async fn position_seconds(&self) -> Result<f64>;

    /// The surface's actual play state.
    async fn play_state(&self) -> Result<SurfacePlayState>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Seek the surface to an absolute position in seconds.
    async fn seek_to(&self, position_seconds: f64) -> Result<()>;

    /// Stop playback and unload the current content.
    async fn stop(&self) -> Result<()>;
}
