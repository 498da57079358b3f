//! Error types for termsync.

use thiserror::Error;

/// Errors that abort a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed schedule feed: {0}")]
    MalformedFeed(String),

    #[error("Failed to list events in the sync window: {0}")]
    List(#[source] SinkError),

    #[error("Failed to insert event '{summary}': {source}")]
    Insert {
        summary: String,
        #[source]
        source: SinkError,
    },
}

/// Errors from a single destination-calendar call.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("event not found: {0}")]
    NotFound(String),

    #[error("event rejected by the calendar service: {0}")]
    Validation(String),
}

/// Errors from fetching the schedule feed from the portal.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("portal login failed: {0}")]
    Auth(String),

    #[error("network error talking to the portal: {0}")]
    Network(String),

    #[error("schedule feed not found: {0}")]
    NotFound(String),
}

/// Result type alias for core sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
