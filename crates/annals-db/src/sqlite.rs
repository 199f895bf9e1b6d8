//! `SQLite` connection handling for one session's store file.
//!
//! Each save session gets its own database file. The file is opened in WAL
//! mode so history reads from the API never wait on the simulation's
//! writes, with foreign keys enforced so participant rows cascade with
//! their event. Queries are built at runtime (not compile-time checked)
//! to avoid requiring a live database at build time, and every value is
//! bound as a parameter.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::DbError;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Default time a statement waits on a locked database before failing.
///
/// Kept short: a write that cannot get the lock quickly is dropped rather
/// than stalling the simulation tick.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 1_000;

/// Default time to wait for a free pooled connection.
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 2_000;

/// Configuration for one session's `SQLite` store.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path of the database file. Created, with its parent directory, if absent.
    pub path: PathBuf,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// How long a statement waits on a lock held by another connection.
    pub busy_timeout: Duration,
    /// How long to wait for a pooled connection.
    pub acquire_timeout: Duration,
}

impl SqliteConfig {
    /// Create a new configuration for the given database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            acquire_timeout: Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS),
        }
    }

    /// Point the configuration at another file, keeping the tuning.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the lock wait timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the connection acquire timeout.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Open (creating if needed) the database file and bring its schema up
/// to date.
///
/// Schema creation is idempotent: opening an initialized store applies
/// nothing.
///
/// # Errors
///
/// Returns [`DbError::Io`] if the parent directory cannot be created,
/// [`DbError::Sqlite`] if the file cannot be opened, or
/// [`DbError::Migration`] if the schema cannot be applied.
pub async fn connect(config: &SqliteConfig) -> Result<SqlitePool, DbError> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await?;

    if let Err(e) = run_migrations(&pool).await {
        pool.close().await;
        return Err(e);
    }

    tracing::debug!(
        path = %config.path.display(),
        max_connections = config.max_connections,
        "Opened SQLite store"
    );

    Ok(pool)
}

/// Apply all pending migrations from the `migrations/` directory.
///
/// # Errors
///
/// Returns [`DbError::Migration`] if any migration fails.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Whether a store file already exists at `path`.
///
/// Used by the session lifecycle to decide between resume and migration,
/// so it must be checked before [`connect`] creates the file.
pub async fn store_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
