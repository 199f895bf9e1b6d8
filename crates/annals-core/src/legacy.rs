//! One-shot import of legacy event lists into an event store.
//!
//! Before the event store existed, a session's events lived in its world
//! snapshot as a flat JSON array. [`migrate`] replays such a list through
//! [`EventStore::add_event`]. Records are imported independently: a
//! malformed or rejected record is logged and skipped, and the rest still
//! land.
//!
//! Whether migration runs at all is decided by the session lifecycle in
//! [`crate::manager`], not here.

use std::path::Path;

use annals_db::EventStore;
use annals_types::{AvatarId, Event, EventId, MonthStamp};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::EventLogError;

/// Namespace for ids synthesized for legacy records that carry none.
pub const LEGACY_NAMESPACE: Uuid = Uuid::from_u128(0x9c3e_51d2_7a4b_4f08_b6e1_2d0c_8a57_f914);

/// One event record as stored in a legacy world snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyEvent {
    /// Simulation month.
    pub month_stamp: i64,
    /// Narrative payload.
    pub content: String,
    /// Participating avatar ids, if any were recorded.
    #[serde(default)]
    pub related_avatars: Option<Vec<String>>,
    /// Long-term significance.
    #[serde(default)]
    pub is_major: bool,
    /// Narrative-arc significance.
    #[serde(default)]
    pub is_story: bool,
    /// Event id; older snapshots omit it.
    #[serde(default)]
    pub id: Option<String>,
    /// Unix time in (fractional) seconds.
    #[serde(default)]
    pub created_at: Option<f64>,
}

impl LegacyEvent {
    /// Convert into an [`Event`]. `position` is the record's index in the
    /// legacy list and seeds the id when the record has none.
    pub fn into_event(self, position: usize) -> Event {
        let id = match self.id.filter(|id| !id.is_empty()) {
            Some(id) => EventId::new(id),
            None => synthetic_id(position, self.month_stamp, &self.content),
        };
        Event {
            id,
            month_stamp: MonthStamp(self.month_stamp),
            content: self.content,
            participants: self
                .related_avatars
                .unwrap_or_default()
                .into_iter()
                .map(AvatarId::new)
                .collect(),
            is_major: self.is_major,
            is_story: self.is_story,
            created_at: self.created_at.and_then(timestamp_from_secs),
        }
    }
}

/// Deterministic id for a legacy record, stable across re-runs so a
/// repeated import is caught as a duplicate.
pub fn synthetic_id(position: usize, month_stamp: i64, content: &str) -> EventId {
    EventId::derive(
        &LEGACY_NAMESPACE,
        &format!("{position}:{month_stamp}:{content}"),
    )
}

fn timestamp_from_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    // Float-to-int casts saturate; out-of-range values are rejected below.
    #[allow(clippy::cast_possible_truncation)]
    let micros = (secs * 1_000_000.0).round() as i64;
    DateTime::from_timestamp_micros(micros)
}

/// The part of a legacy world snapshot that holds events.
///
/// Records are kept as raw JSON so one malformed record does not prevent
/// the others from being imported.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LegacySnapshot {
    /// Event records in their original order.
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

impl LegacySnapshot {
    /// Parse a snapshot document. Unrelated world-state keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the document is not an object or its
    /// `events` member is not an array.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read the snapshot at `path`. A missing file yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Io`] if the file exists but cannot be read,
    /// or [`EventLogError::Legacy`] if it cannot be parsed.
    pub async fn load(path: &Path) -> Result<Option<Self>, EventLogError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(EventLogError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&contents)
            .map(Some)
            .map_err(|source| EventLogError::Legacy {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Outcome of one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Records written to the store.
    pub imported: u64,
    /// Records that were malformed or rejected by the store.
    pub skipped: u64,
}

/// Import `records` into `store` in order.
///
/// Never fails as a whole; per-record failures are logged and counted.
pub async fn migrate(records: &[serde_json::Value], store: &EventStore) -> MigrationReport {
    let mut report = MigrationReport::default();

    for (position, record) in records.iter().enumerate() {
        let legacy = match LegacyEvent::deserialize(record) {
            Ok(legacy) => legacy,
            Err(e) => {
                tracing::warn!(position, error = %e, "Skipping malformed legacy event");
                report.skipped = report.skipped.saturating_add(1);
                continue;
            }
        };
        // The store logs its own failures.
        match store.add_event(&legacy.into_event(position)).await {
            Ok(()) => report.imported = report.imported.saturating_add(1),
            Err(_) => report.skipped = report.skipped.saturating_add(1),
        }
    }

    tracing::info!(
        path = %store.path().display(),
        imported = report.imported,
        skipped = report.skipped,
        "Legacy events migrated"
    );
    report
}
