//! On-disk layout of save sessions.
//!
//! A session's event store sits next to its world-state snapshot:
//!
//! ```text
//! saves/
//!   save_20260105_1423.json        world snapshot (legacy events inside)
//!   save_20260105_1423_events.db   event store
//! ```

use std::path::{Path, PathBuf};

use annals_types::SessionId;

/// Resolves per-session file paths under one saves directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    saves_dir: PathBuf,
}

impl SessionLayout {
    /// Layout rooted at `saves_dir`.
    pub fn new(saves_dir: impl Into<PathBuf>) -> Self {
        Self {
            saves_dir: saves_dir.into(),
        }
    }

    /// Directory holding every session's files.
    pub fn saves_dir(&self) -> &Path {
        &self.saves_dir
    }

    /// Event store file of `session`.
    pub fn events_db_path(&self, session: &SessionId) -> PathBuf {
        self.saves_dir.join(format!("{session}_events.db"))
    }

    /// World-state snapshot of `session`, the source of legacy events.
    pub fn snapshot_path(&self, session: &SessionId) -> PathBuf {
        self.saves_dir.join(format!("{session}.json"))
    }
}
