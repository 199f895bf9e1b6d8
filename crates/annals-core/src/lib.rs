//! Event manager, session lifecycle, and legacy import for the Annals
//! simulation event log.
//!
//! The simulation loop and the history API talk to one [`EventManager`],
//! which binds the event store of the active save session and hides the
//! store's lifecycle from its callers.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `annals-config.yaml` into
//!   strongly-typed structs.
//! - [`manager`] -- [`EventManager`] and the session state machine.
//! - [`legacy`] -- One-shot import of events held in legacy world snapshots.
//! - [`session`] -- Per-session file layout under the saves directory.
//! - [`error`] -- [`EventLogError`].

pub mod config;
pub mod error;
pub mod legacy;
pub mod manager;
pub mod session;

pub use config::{AnnalsConfig, ConfigError};
pub use error::EventLogError;
pub use legacy::{LegacyEvent, LegacySnapshot, MigrationReport, migrate};
pub use manager::{BindOutcome, EventManager, LegacySource};
pub use session::SessionLayout;
