//! Native (desktop) implementations of the platform bridge traits.
//!
//! Talks to the shared player server over plain HTTP for commands and
//! queries, and over a websocket for the push channel. Both implementations
//! are stateless adapters; all retry, backoff and merge logic lives in
//! `core-sync`.

pub mod http_api;
pub mod ws_push;

pub use http_api::HttpPlayerApi;
pub use ws_push::WsPushTransport;
