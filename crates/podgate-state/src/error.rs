//! Error types for cluster views and the cycle store.

use thiserror::Error;

/// Result type alias for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading cluster state or cycle data.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The backing view could not be reached (transport, cache not synced).
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("cycle key {key} does not hold a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("cycle store lock poisoned")]
    Poisoned,
}
