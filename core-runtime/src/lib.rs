//! # Runtime Infrastructure
//!
//! Shared plumbing for the client core: the event bus that fans accepted
//! snapshots and optimistic command signals out to observers, the logging
//! setup, and the configuration types for the sync engine and the drift
//! correction loop.
//!
//! ## Components
//!
//! - **Event Bus** (`events`): typed broadcast channel; UI renderers and the
//!   drift loop subscribe, the sync engine publishes.
//! - **Logging** (`logging`): `tracing-subscriber` initialization with
//!   env-filter and selectable output format.
//! - **Config** (`config`): `SyncConfig` and `DriftConfig` with the tuned
//!   defaults of the production deployment, plus validation.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{DriftConfig, SyncConfig};
pub use error::{Error, Result};
pub use events::{EventBus, EventSeverity, EventStream, PlayerEvent};
