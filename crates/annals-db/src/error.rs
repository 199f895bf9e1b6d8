//! Error types for the data layer.
//!
//! All storage failures are carried by [`DbError`], which wraps the
//! underlying [`sqlx`] errors with context about which operation failed.
//! The event store logs each error once at its public boundary; callers
//! receive the typed value and never a panic.

use annals_types::EventId;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `SQLite` operation failed (disk, lock contention, corruption,
    /// or a closed pool).
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// Creating or upgrading the schema failed.
    #[error("SQLite migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A filesystem operation around the store file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An event with the same id is already stored.
    #[error("duplicate event id: {0}")]
    DuplicateEvent(EventId),
}
