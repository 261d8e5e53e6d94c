//! # Playback State Model
//!
//! Value types shared by every crate in the workspace.
//!
//! ## Overview
//!
//! This crate defines:
//! - [`StateSnapshot`]: an immutable, complete description of the shared
//!   player's state at one instant. Snapshots are replaced wholesale on each
//!   update, never merged field-by-field, so a rendered view can never mix
//!   fields from two different points in time.
//! - [`LoopMode`]: the three-state repeat mode carried on the wire as `0..=2`.
//! - Wire payloads ([`wire`]): the JSON shapes the server produces over the
//!   push channel and the command/query endpoints, plus the conversions into
//!   [`StateSnapshot`].
//!
//! The crate is pure data: no I/O, no async, no behavior beyond conversions
//! and a couple of derived accessors.

pub mod snapshot;
pub mod wire;

pub use snapshot::{LoopMode, StateSnapshot, PITCH_SHIFT_MAX, PITCH_SHIFT_MIN};
pub use wire::{CommandAck, CommandStatus, MpvState, PushMessage, StatusResponse, TrackMeta};
