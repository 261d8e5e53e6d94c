//! Push channel abstraction.
//!
//! The push channel is a persistent server-to-client connection delivering
//! state snapshots without polling. The sync core owns the channel's whole
//! lifecycle (connect, heartbeat, backoff-reconnect, teardown); this module
//! only abstracts the raw transport underneath it.

use async_trait::async_trait;

use crate::error::Result;

/// Factory for push-channel connections.
///
/// `connect` is called for every (re)connection attempt; a returned error
/// feeds the caller's backoff policy. Implementations must not retry
/// internally.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Establish a fresh connection to the push endpoint.
    async fn connect(&self) -> Result<Box<dyn PushConnection>>;
}

/// A live push-channel connection.
///
/// Transport-level control frames (protocol ping/pong, close handshakes) are the
/// implementation's business; only text payloads surface here.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait PushConnection: Send {
    /// Receive the next text frame.
    ///
    /// Returns `Ok(None)` when the server closed the connection cleanly and
    /// `Err` on transport failure; the caller treats both as a disconnect.
    /// Must be cancel-safe: the caller races `recv` against its heartbeat
    /// timer and will drop the future without polling it to completion.
    async fn recv(&mut self) -> Result<Option<String>>;

    /// Send a text frame (used for the application-level heartbeat).
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Close the connection. Best effort; errors are ignored by callers.
    async fn close(&mut self) -> Result<()>;
}
