//! Error types for MultiKV
//!
//! Every record operation reports its outcome through this type. None of the
//! record-level variants leave shared state modified: a failed call behaves as
//! if it was never issued.

use thiserror::Error;

/// Result type alias using MultiKvError
pub type Result<T> = std::result::Result<T, MultiKvError>;

/// Unified error type for MultiKV operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultiKvError {
    // -------------------------------------------------------------------------
    // Lookup Outcomes
    // -------------------------------------------------------------------------
    #[error("No data for the given key")]
    NotFound,

    /// The record exists but carries the soft-delete mark.
    #[error("Record is deleted")]
    Deleted,

    #[error("Record has expired")]
    Expired,

    /// The main key is only known as a placeholder marker.
    #[error("Main key holds only the key marker")]
    OnlyKey,

    // -------------------------------------------------------------------------
    // Write Outcomes
    // -------------------------------------------------------------------------
    #[error("Main key already holds records")]
    AlreadyExists,

    #[error("Version mismatch: expected {expected}, stored {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    #[error("Store is read-only")]
    ReadOnly,

    #[error("Main key already holds {limit} records and none can be evicted")]
    GroupFull { limit: usize },

    // -------------------------------------------------------------------------
    // Memory Errors
    // -------------------------------------------------------------------------
    #[error("Out of space: requested {requested} bytes, {available} available")]
    OutOfSpace { requested: usize, available: usize },

    #[error("Invalid chunk handle: {0}")]
    InvalidHandle(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
