//! Error types for the event manager and session lifecycle.

use std::path::PathBuf;

use annals_db::DbError;
use annals_types::InvalidSessionId;

/// Errors surfaced by [`crate::EventManager`] operations that report
/// failure to their caller.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// No session is bound; the operation had nothing to act on.
    #[error("no session is bound")]
    NoSession,

    /// The bound store failed.
    #[error("event store error: {0}")]
    Store(#[from] DbError),

    /// A legacy world snapshot could not be parsed.
    #[error("failed to parse legacy snapshot {path}: {source}")]
    Legacy {
        /// Snapshot file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// A legacy world snapshot could not be read.
    #[error("failed to read legacy snapshot {path}: {source}")]
    Io {
        /// Snapshot file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The session identifier is not usable as a save slot name.
    #[error("invalid session id: {0}")]
    InvalidSession(#[from] InvalidSessionId),
}
