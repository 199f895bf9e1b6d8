//! History API startup helper for embedding in the engine binary.
//!
//! Provides [`spawn_observer`] which binds the listening socket and then
//! runs the server on a background Tokio task, so the API serves
//! concurrently with the simulation loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the history API server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A history API server running on a background task.
#[derive(Debug)]
pub struct ObserverHandle {
    /// Address actually bound (resolves port `0`).
    pub addr: SocketAddr,
    /// The serving task. Completes after `shutdown` resolves.
    pub task: JoinHandle<()>,
}

/// Bind the history API and serve it on a background Tokio task until
/// `shutdown` resolves.
///
/// Binding happens before the task is spawned so an unusable address is
/// reported to the caller instead of only being logged.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the server cannot bind to the
/// requested address.
pub async fn spawn_observer<F>(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<ObserverHandle, StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = server::bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let task = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "History API exited with error");
        }
    });

    tracing::info!(%addr, "History API spawned on background task");

    Ok(ObserverHandle { addr, task })
}
