use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Bridge capability not available: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
