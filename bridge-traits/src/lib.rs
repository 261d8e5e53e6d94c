//! # Host Bridge Traits
//!
//! Abstraction traits between the sync core and the outside world.
//!
//! ## Overview
//!
//! This crate defines the contract the core requires from its collaborators
//! without prescribing how they are implemented. Each trait represents a
//! capability that differs per deployment (HTTP vs. in-process test double,
//! real websocket vs. channel-backed fake, real video element vs. mock):
//!
//! - [`PlayerApi`](api::PlayerApi) — the command/query surface of the shared
//!   player server. One idempotent state query plus thin mutation calls.
//! - [`PushTransport`](push::PushTransport) / [`PushConnection`](push::PushConnection) —
//!   the persistent push channel delivering state without polling.
//! - [`SecondarySurface`](surface::SecondarySurface) — the embedded video
//!   element kept frame-accurate with the server's audio clock.
//!
//! ## Error Handling
//!
//! All traits use [`BridgeError`](error::BridgeError). Implementations should
//! convert transport-specific errors into it and keep messages actionable.
//! Surface implementations additionally classify errors as fatal
//! (content permanently unplayable) or transient via
//! [`SurfaceError`](surface::SurfaceError).
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so implementations can be shared across
//! async tasks behind `Arc`.
//!
//! ## Testing
//!
//! With the `mocks` feature enabled, `mockall` mocks (`MockPlayerApi`,
//! `MockSecondarySurface`, ...) are exported for dependent crates' tests.

pub mod api;
pub mod error;
pub mod push;
pub mod surface;

pub use api::PlayerApi;
pub use error::BridgeError;
pub use push::{PushConnection, PushTransport};
pub use surface::{SecondarySurface, SurfaceError, SurfacePlayState};

#[cfg(feature = "mocks")]
pub use api::MockPlayerApi;
#[cfg(feature = "mocks")]
pub use push::{MockPushConnection, MockPushTransport};
#[cfg(feature = "mocks")]
pub use surface::MockSecondarySurface;
