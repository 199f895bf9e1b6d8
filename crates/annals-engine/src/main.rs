//! Engine binary for the Annals simulation event log.
//!
//! Loads configuration, binds the configured save session (creating,
//! resuming, or migrating its event store), and serves the history API
//! until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `annals-config.yaml` (or `ANNALS_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the event manager and bind the configured session
//! 4. Spawn the history API
//! 5. Wait for `Ctrl-C`, drain the API, unbind the session

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use annals_core::{AnnalsConfig, EventManager};
use annals_observer::{AppState, PageLimits, ServerConfig, spawn_observer};
use annals_types::SessionId;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "annals-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration loading, session binding, or
/// server startup fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config);
    info!("annals-engine starting");
    match &config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }

    // 3. Event manager and session.
    let events = Arc::new(EventManager::from_config(&config));
    if let Some(name) = config.session.name.as_deref() {
        let session = SessionId::parse(name).map_err(annals_core::EventLogError::from)?;
        let outcome = events.bind_session(&session).await?;
        info!(
            session = %session,
            outcome = ?outcome,
            event_count = events.count().await,
            "Session ready"
        );
    } else {
        info!("No session configured; serving without history");
    }

    // 4. History API.
    let state = Arc::new(
        AppState::new(Arc::clone(&events)).with_page_limits(PageLimits::from_config(&config.observer)),
    );
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let observer = spawn_observer(&ServerConfig::from(&config.observer), state, async move {
        let _ = stop_rx.await;
    })
    .await?;
    info!(addr = %observer.addr, "History API ready");

    // 5. Shutdown.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    let _ = stop_tx.send(());
    if let Err(e) = observer.task.await {
        tracing::warn!(error = %e, "History API task ended abnormally");
    }
    events.unbind_session().await;

    info!("annals-engine shutdown complete");
    Ok(())
}

/// Load the configuration from `ANNALS_CONFIG` or `annals-config.yaml`.
///
/// Returns the path that was read, or `None` when the file is absent and
/// defaults (plus environment overrides) are used.
fn load_config() -> Result<(AnnalsConfig, Option<PathBuf>), EngineError> {
    let path = std::env::var_os("ANNALS_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        let config = AnnalsConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        let mut config = AnnalsConfig::default();
        config.apply_env_overrides();
        Ok((config, None))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(config: &AnnalsConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
