//! Shared type definitions for the Annals simulation event log.
//!
//! This crate is the single source of truth for the types that flow
//! between the simulation loop, the event store, and the history API.
//! Types are exported to `TypeScript` via `ts-rs` for the UI.
//!
//! # Modules
//!
//! - [`ids`] -- String-backed identifiers for events and avatars, and the
//!   validated [`SessionId`] that names a save slot
//! - [`time`] -- [`MonthStamp`], the simulation-time ordering key
//! - [`structs`] -- The [`Event`] record and read filters

pub mod ids;
pub mod structs;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use ids::{AvatarId, EventId, InvalidSessionId, MAX_SESSION_ID_LEN, SessionId};
pub use structs::{Event, EventFilter, Significance};
pub use time::{MONTHS_PER_YEAR, MonthStamp};
