use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriftError {
    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DriftError>;
