//! Error types for the ingestion engine
//!
//! Every error aborts only the tick it happened in. The next scheduled
//! tick resumes from the last durable checkpoint.

use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Ingestion error taxonomy
#[derive(Error, Debug)]
pub enum IngestError {
    /// The token exchange endpoint rejected the refresh credential
    #[error("Token exchange failed with status {status}: {message}")]
    AuthExchange { status: u16, message: String },

    /// The log API answered with a non-success status (including a 401 that
    /// survived one refresh)
    #[error("Audit log request failed with status {status}: {body}")]
    Fetch { status: u16, body: String },

    /// Checkpoint storage failed
    #[error("Checkpoint store error: {0}")]
    CheckpointStore(String),

    /// Credential storage failed
    #[error("Credential store error: {0}")]
    CredentialStore(String),

    /// No credential is stored under the given realm yet
    #[error("No {0} stored. Run 'auditsync save-token' to complete setup.")]
    MissingCredential(&'static str),

    /// Writing to the event sink failed
    #[error("Event sink error: {0}")]
    Sink(String),

    /// A record returned by the API is unusable
    #[error("Invalid log record: {0}")]
    InvalidRecord(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables and sources file.")]
    Config(String),

    /// One or more sources failed during a single-shot run
    #[error("{0} source(s) failed to sync, see the log for details")]
    TicksFailed(usize),

    /// Transport-level HTTP failure
    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a checkpoint store error
    pub fn checkpoint_store(msg: impl Into<String>) -> Self {
        Self::CheckpointStore(msg.into())
    }

    /// Create a credential store error
    pub fn credential_store(msg: impl Into<String>) -> Self {
        Self::CredentialStore(msg.into())
    }

    /// Create an invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a sink error
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }
}
