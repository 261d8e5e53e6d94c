use thiserror::Error;

/// Errors surfaced by the sync engine and its helpers.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport or API failure from the platform bridge.
    #[error("bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    /// The daemon accepted the request but reported a failure status.
    #[error("command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `start` called while the engine's background tasks are running.
    #[error("sync engine is already running")]
    AlreadyRunning,

    /// `stop` called before `start`.
    #[error("sync engine is not running")]
    NotRunning,
}

pub type Result<T> = std::result::Result<T, SyncError>;
