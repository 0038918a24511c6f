use thiserror::Error;

/// Shared error type used across all tokendist crates.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Metadata fetch error: {0}")]
    Metadata(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] eyre::Error),
}

/// Failure to turn raw log bytes into a typed event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed log: {0}")]
    MalformedLog(String),

    #[error("expected {expected} topics, found {found}")]
    MissingTopic { expected: usize, found: usize },

    #[error("batch transfer has {ids} ids but {amounts} amounts")]
    LengthMismatch { ids: usize, amounts: usize },
}
