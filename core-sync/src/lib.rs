//! Playback state synchronization against a remote player daemon.
//!
//! The engine keeps a local [`core_model::StateSnapshot`] mirror of the
//! server's playback state using two transports at once: a push channel
//! (preferred, low latency) and periodic HTTP polling (fallback, always
//! running at a reduced cadence while the push channel is healthy).
//!
//! User-initiated commands go through an [`lock::OperationLockCoordinator`]
//! so that in-flight operations are not clobbered by a concurrently polled
//! snapshot that predates the command's effect.

pub mod engine;
pub mod error;
pub mod lock;

mod poller;
mod push;

pub use engine::{SnapshotSource, SyncEngine};
pub use error::{Result, SyncError};
pub use lock::{LockGuard, LockInfo, LockStatus, OperationLockCoordinator};
pub use push::Backoff;
