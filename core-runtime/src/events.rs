//! # Event Bus
//!
//! Decoupled communication between the sync engine and its observers using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The sync engine is the only publisher. Two kinds of events flow:
//!
//! - [`PlayerEvent::StateUpdate`] fires on every *accepted* snapshot and
//!   carries both the old and the new value so observers can diff.
//! - Command events (`Play`, `Pause`, `Seek`, ...) fire optimistically as
//!   the direct result of a local command invocation — they do not wait for
//!   the next snapshot, so the UI can react without a visible round-trip lag.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, PlayerEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(PlayerEvent::Pause).ok();
//! assert!(matches!(rx.recv().await, Ok(PlayerEvent::Pause)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Slow subscribers receive `RecvError::Lagged(n)` and may continue;
//! `RecvError::Closed` signals shutdown. For state updates, lagging is
//! harmless by construction — every snapshot is a total replacement, so a
//! subscriber that missed some can simply use the next one.

use core_model::{LoopMode, StateSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Events published by the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    /// A snapshot was accepted as the new authoritative state.
    ///
    /// `old` is `None` for the first snapshot after startup. Both values are
    /// passed so observers can diff instead of re-rendering everything.
    StateUpdate {
        old: Option<StateSnapshot>,
        new: StateSnapshot,
    },
    /// A play command was issued locally.
    Play { title: String },
    /// A pause command was issued locally.
    Pause,
    /// Skip to the next track was issued locally.
    Next,
    /// Skip to the previous track was issued locally.
    Prev,
    /// A seek command was issued locally.
    Seek { position_seconds: f64 },
    /// A volume change was issued locally.
    VolumeChange { level: f64 },
    /// The loop mode was cycled locally.
    LoopChange { mode: LoopMode },
    /// The pitch shift was changed locally.
    PitchChange { semitones: i8 },
    /// The server reported a playlist content change. Suppressed while
    /// operation locks are active so in-flight edits are not clobbered.
    PlaylistChanged { playlist_id: String },
    /// The push channel came up.
    ChannelConnected,
    /// The push channel dropped; polling is back at its primary cadence.
    ChannelDisconnected,
}

impl PlayerEvent {
    /// Human-readable description.
    pub fn description(&self) -> &str {
        match self {
            PlayerEvent::StateUpdate { .. } => "Authoritative state updated",
            PlayerEvent::Play { .. } => "Playback requested",
            PlayerEvent::Pause => "Pause requested",
            PlayerEvent::Next => "Next track requested",
            PlayerEvent::Prev => "Previous track requested",
            PlayerEvent::Seek { .. } => "Seek requested",
            PlayerEvent::VolumeChange { .. } => "Volume changed",
            PlayerEvent::LoopChange { .. } => "Loop mode changed",
            PlayerEvent::PitchChange { .. } => "Pitch shift changed",
            PlayerEvent::PlaylistChanged { .. } => "Playlist contents changed",
            PlayerEvent::ChannelConnected => "Push channel connected",
            PlayerEvent::ChannelDisconnected => "Push channel disconnected",
        }
    }

    /// Severity level, for filtering and log mirroring.
    pub fn severity(&self) -> EventSeverity {
        match self {
            PlayerEvent::ChannelDisconnected => EventSeverity::Warning,
            PlayerEvent::ChannelConnected | PlayerEvent::PlaylistChanged { .. } => {
                EventSeverity::Info
            }
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Central event bus for publishing and subscribing to [`PlayerEvent`]s.
///
/// Cloning the bus clones the sender side; each `subscribe()` creates an
/// independent receiver. Sends never block.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it, or an error when
    /// there are none. Publishers treat "no subscribers" as non-fatal.
    pub fn emit(&self, event: PlayerEvent) -> Result<usize, SendError<PlayerEvent>> {
        self.sender.send(event)
    }

    /// Creates a new independent subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&PlayerEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` wrapper with optional filtering.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, PlayerEvent};
///
/// let bus = EventBus::new(100);
/// let updates = EventStream::new(bus.subscribe())
///     .filter(|e| matches!(e, PlayerEvent::StateUpdate { .. }));
/// ```
pub struct EventStream {
    receiver: Receiver<PlayerEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<PlayerEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter; only matching events are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PlayerEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` if all senders were dropped.
    pub async fn recv(&mut self) -> Result<PlayerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            let Some(filter) = &self.filter else {
                return Ok(event);
            };
            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive without blocking; `None` when no event is ready.
    pub fn try_recv(&mut self) -> Option<Result<PlayerEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };
                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(revision: f64) -> StateSnapshot {
        StateSnapshot::empty(revision)
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert!(bus.emit(PlayerEvent::Pause).is_err());
    }

    #[tokio::test]
    async fn test_state_update_carries_old_and_new() {
        let bus = EventBus::new(10);
        let mut sub = bus.subscribe();

        let event = PlayerEvent::StateUpdate {
            old: Some(snapshot(1.0)),
            new: snapshot(2.0),
        };
        bus.emit(event.clone()).ok();

        let received = sub.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        bus.emit(PlayerEvent::ChannelConnected).ok();

        assert_eq!(sub1.recv().await.unwrap(), PlayerEvent::ChannelConnected);
        assert_eq!(sub2.recv().await.unwrap(), PlayerEvent::ChannelConnected);
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|e| matches!(e, PlayerEvent::StateUpdate { .. }));

        bus.emit(PlayerEvent::Pause).ok();
        bus.emit(PlayerEvent::StateUpdate {
            old: None,
            new: snapshot(1.0),
        })
        .ok();

        let received = stream.recv().await.unwrap();
        assert!(matches!(received, PlayerEvent::StateUpdate { .. }));
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(PlayerEvent::Seek {
                position_seconds: i as f64,
            })
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_severity() {
        assert_eq!(
            PlayerEvent::ChannelDisconnected.severity(),
            EventSeverity::Warning
        );
        assert_eq!(PlayerEvent::Pause.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = PlayerEvent::LoopChange {
            mode: LoopMode::All,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PlayerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
