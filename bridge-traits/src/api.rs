//! Command/query surface of the shared player server.

use async_trait::async_trait;
use core_model::{CommandAck, StatusResponse};

use crate::error::Result;

/// The request/response API of the server-authoritative player.
///
/// `get_state` is idempotent and safe to poll at high frequency. The
/// mutation calls are thin request/response wrappers with no consistency
/// hazards of their own; any partial state returned in a [`CommandAck`] is
/// only a hint for optimistic UI patching and is always superseded by the
/// next real snapshot.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::PlayerApi;
///
/// async fn skip(api: &dyn PlayerApi) -> bridge_traits::error::Result<()> {
///     let ack = api.next().await?;
///     if let Some(meta) = ack.current {
///         println!("now playing: {:?}", meta.title);
///     }
///     Ok(())
/// }
/// ```
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait PlayerApi: Send + Sync {
    /// Fetch the complete current playback state.
    async fn get_state(&self) -> Result<StatusResponse>;

    /// Start playing a track identified by URL.
    async fn play(&self, url: &str, title: &str, kind: &str) -> Result<CommandAck>;

    /// Toggle pause. The server's pause endpoint has toggle semantics; the
    /// ack's `paused` field reports the state after the toggle.
    async fn toggle_pause(&self) -> Result<CommandAck>;

    /// Skip to the next track in the active playlist.
    async fn next(&self) -> Result<CommandAck>;

    /// Return to the previous track.
    async fn prev(&self) -> Result<CommandAck>;

    /// Seek to an absolute position in seconds.
    ///
    /// `duration_seconds` is the caller's best knowledge of the track
    /// length (0 when unknown); transports whose wire format addresses
    /// positions relative to the track need it for the conversion.
    async fn seek(&self, position_seconds: f64, duration_seconds: f64) -> Result<CommandAck>;

    /// Set the output volume, `0..=100`.
    async fn set_volume(&self, level: f64) -> Result<CommandAck>;

    /// Advance the loop mode (off -> single -> all -> off).
    async fn cycle_loop(&self) -> Result<CommandAck>;

    /// Set the KTV pitch shift in semitones, `-6..=6`.
    async fn set_pitch(&self, semitones: i8) -> Result<CommandAck>;
}
