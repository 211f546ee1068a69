//! Error types shared by the auditsync crates

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the shared utilities
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Invalid timestamp '{value}': expected {expected}")]
    InvalidTimestamp { value: String, expected: &'static str },
}
