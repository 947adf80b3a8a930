use thiserror::Error;

/// Result type for counter store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("short code is empty")]
    Empty,
    #[error("short code is not canonical: {0}")]
    NonCanonical(String),
    #[error("short code is malformed: {0}")]
    Malformed(String),
    #[error("short code does not fit in 64 bits: {0}")]
    Overflow(String),
}

/// Errors raised while decoding a click event from a queue message body.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("click event is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("click event has an empty short code")]
    EmptyShortCode,
    #[error("click event short code has {len} characters, at most {max} fit a counter")]
    ShortCodeTooLong { len: usize, max: usize },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage migration failed: {0}")]
    Migration(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}
