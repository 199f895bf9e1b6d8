//! History API server for the Annals event log.
//!
//! This crate provides an Axum HTTP server that exposes the bound save
//! session's event history to the UI:
//!
//! - **Paginated reads** (`GET /api/events`) with single-avatar and
//!   avatar-pair filters and opaque cursors
//! - **Cleanup** (`DELETE /api/events/cleanup`), only ever invoked by an
//!   explicit user action
//! - **Session status** (`GET /api/session`)
//!
//! # Architecture
//!
//! Every handler goes through the shared
//! [`EventManager`](annals_core::EventManager). Storage failures on reads
//! surface as empty pages, never as errors, so a broken history view
//! cannot take the UI down.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use startup::{ObserverHandle, StartupError, spawn_observer};
pub use state::{AppState, PageLimits};
