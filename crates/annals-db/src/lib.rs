//! Data layer for the Annals event log (embedded `SQLite`).
//!
//! Each save session owns one store file holding its narrative events and
//! the avatars that took part in them. The simulation writes events one at
//! a time; the history API and the memory system read them back in
//! newest-first pages.
//!
//! # Architecture
//!
//! ```text
//! Simulation tick
//!     |
//!     +-- add_event --------> EventStore --> {session}_events.db
//!                                 ^               |-- events
//! History API / memory            |               +-- event_avatars
//!     |                           |
//!     +-- get_events(cursor) -----+
//! ```
//!
//! # Modules
//!
//! - [`sqlite`] -- Store file opening, tuning, and schema migration
//! - [`event_store`] -- Atomic event writes, paginated reads, cleanup
//! - [`cursor`] -- Opaque pagination cursor codec
//! - [`error`] -- Shared error types

pub mod cursor;
pub mod error;
pub mod event_store;
pub mod sqlite;

// Re-export primary types for convenience.
pub use cursor::{Cursor, CursorError};
pub use error::DbError;
pub use event_store::{EventPage, EventStore};
pub use sqlite::{SqliteConfig, store_exists};
