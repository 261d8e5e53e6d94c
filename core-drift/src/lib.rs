//! Drift correction for the synchronized video surface.
//!
//! The shared player's audio clock is authoritative; the embedded video
//! surface has its own clock that slowly wanders. This crate consumes the
//! snapshots the sync engine produces and keeps the surface aligned with
//! bounded, hysteresis-guarded corrections so it never fights the surface's
//! own playback.

pub mod controller;
pub mod error;
pub mod metrics;

pub use controller::{spawn, AlignmentState, DriftController};
pub use error::{DriftError, Result};
pub use metrics::{DriftMetrics, MetricsSnapshot};
