//! Event store for one save session.
//!
//! Events and their participant rows are written in a single transaction,
//! so a concurrent reader never sees an event without its participants.
//! Reads run inside a read transaction for the same reason.
//!
//! The traversal order is `(month_stamp DESC, seq DESC)`: newest simulation
//! month first, most recently inserted first within a month. `seq` is the
//! store-internal insertion sequence; `created_at` is carried for display
//! only, since legacy rows may lack a meaningful timestamp.
//!
//! # Failure policy
//!
//! The store sits under the simulation loop, so storage trouble must never
//! become a liveness problem:
//!
//! - [`EventStore::add_event`] and [`EventStore::cleanup`] return a
//!   [`DbError`] after logging it. Nothing partial is committed.
//! - Every read logs and degrades to an empty result.
//!
//! No method panics.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use annals_types::{AvatarId, Event, EventFilter, EventId, MonthStamp, Significance};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::cursor::Cursor;
use crate::error::DbError;
use crate::sqlite::{self, SqliteConfig};

/// Maximum number of event ids bound into one participant lookup.
const PARTICIPANT_BATCH: usize = 500;

/// Columns selected for every event read.
const EVENT_COLUMNS: &str =
    "SELECT e.seq, e.id, e.month_stamp, e.content, e.is_major, e.is_story, e.created_at FROM events e";

/// One page of the newest-first traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPage {
    /// Events in `(month_stamp DESC, seq DESC)` order.
    pub events: Vec<Event>,
    /// Position just past the last returned event, or `None` once the end
    /// of the log has been reached.
    pub next_cursor: Option<Cursor>,
}

impl EventPage {
    /// Whether another page exists after this one.
    pub const fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Durable, queryable storage of events for one session.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct EventStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl EventStore {
    /// Open or create the store file at `path` with default tuning.
    ///
    /// Safe to call on an already-initialized store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be opened or its schema
    /// cannot be created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, DbError> {
        Self::open_with(&SqliteConfig::new(path)).await
    }

    /// Open or create the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be opened or its schema
    /// cannot be created.
    pub async fn open_with(config: &SqliteConfig) -> Result<Self, DbError> {
        let pool = sqlite::connect(config).await?;
        tracing::info!(path = %config.path.display(), "Event store opened");
        Ok(Self {
            pool,
            path: config.path.clone(),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return a reference to the underlying [`SqlitePool`].
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Whether [`EventStore::close`] has been called on this store.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    // -----------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------

    /// Write an event and all of its participant rows atomically.
    ///
    /// Repeated participants are stored once. The failure is logged here;
    /// callers may drop the error without further reporting.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::DuplicateEvent`] if the id is already stored, or
    /// [`DbError::Sqlite`] on any storage failure. In both cases the store
    /// is left unchanged.
    pub async fn add_event(&self, event: &Event) -> Result<(), DbError> {
        match self.insert_event(event).await {
            Ok(()) => {
                tracing::trace!(event_id = %event.id, "Event stored");
                Ok(())
            }
            Err(e @ DbError::DuplicateEvent(_)) => {
                tracing::warn!(event_id = %event.id, error = %e, "Event not stored");
                Err(e)
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to write event"
                );
                Err(e)
            }
        }
    }

    async fn insert_event(&self, event: &Event) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r"INSERT INTO events (id, month_stamp, content, is_major, is_story, created_at)
              VALUES (?, ?, ?, ?, ?, ?)
              ON CONFLICT(id) DO NOTHING",
        )
        .bind(event.id.as_str())
        .bind(event.month_stamp.into_inner())
        .bind(event.content.as_str())
        .bind(event.is_major)
        .bind(event.is_story)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Err(DbError::DuplicateEvent(event.id.clone()));
        }

        for avatar in &event.participants {
            sqlx::query("INSERT OR IGNORE INTO event_avatars (event_id, avatar_id) VALUES (?, ?)")
                .bind(event.id.as_str())
                .bind(avatar.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    /// Read up to `limit` events matching `filter`, newest first, starting
    /// strictly after `cursor` (or at the newest event if absent).
    ///
    /// Returns an empty page on failure.
    pub async fn get_events(
        &self,
        filter: &EventFilter,
        cursor: Option<&Cursor>,
        limit: u32,
    ) -> EventPage {
        match self.query_page(filter, cursor, None, limit).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    ?filter,
                    error = %e,
                    "Failed to query events"
                );
                EventPage::default()
            }
        }
    }

    /// The most recent `limit` events involving `avatar`, oldest first.
    pub async fn get_events_by_avatar(&self, avatar: &AvatarId, limit: u32) -> Vec<Event> {
        self.recent_chronological(&EventFilter::Avatar(avatar.clone()), None, limit)
            .await
    }

    /// The most recent `limit` events involving both avatars, oldest first.
    pub async fn get_events_between(&self, a: &AvatarId, b: &AvatarId, limit: u32) -> Vec<Event> {
        self.recent_chronological(&EventFilter::Pair(a.clone(), b.clone()), None, limit)
            .await
    }

    /// The most recent `limit` events of one memory tier matching
    /// `filter`, oldest first.
    pub async fn get_memory_events(
        &self,
        filter: &EventFilter,
        tier: Significance,
        limit: u32,
    ) -> Vec<Event> {
        self.recent_chronological(filter, Some(tier), limit).await
    }

    /// The most recent `limit` events of the whole log, oldest first.
    pub async fn recent_events(&self, limit: u32) -> Vec<Event> {
        self.recent_chronological(&EventFilter::All, None, limit)
            .await
    }

    /// Total number of stored events. Returns 0 on failure.
    pub async fn count(&self) -> u64 {
        let result: Result<i64, sqlx::Error> = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await;
        match result {
            Ok(n) => u64::try_from(n).unwrap_or(0),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to count events");
                0
            }
        }
    }

    async fn recent_chronological(
        &self,
        filter: &EventFilter,
        tier: Option<Significance>,
        limit: u32,
    ) -> Vec<Event> {
        match self.query_page(filter, None, tier, limit).await {
            Ok(page) => {
                let mut events = page.events;
                events.reverse();
                events
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    ?filter,
                    ?tier,
                    error = %e,
                    "Failed to query recent events"
                );
                Vec::new()
            }
        }
    }

    async fn query_page(
        &self,
        filter: &EventFilter,
        cursor: Option<&Cursor>,
        tier: Option<Significance>,
        limit: u32,
    ) -> Result<EventPage, DbError> {
        if limit == 0 {
            return Ok(EventPage::default());
        }
        let page_len = usize::try_from(limit).unwrap_or(usize::MAX);

        let mut tx = self.pool.begin().await?;

        let mut qb = QueryBuilder::<Sqlite>::new(EVENT_COLUMNS);
        match filter {
            EventFilter::All => {}
            EventFilter::Avatar(avatar) => {
                qb.push(" JOIN event_avatars a1 ON a1.event_id = e.id AND a1.avatar_id = ")
                    .push_bind(avatar.as_str().to_owned());
            }
            EventFilter::Pair(first, second) => {
                qb.push(" JOIN event_avatars a1 ON a1.event_id = e.id AND a1.avatar_id = ")
                    .push_bind(first.as_str().to_owned())
                    .push(" JOIN event_avatars a2 ON a2.event_id = e.id AND a2.avatar_id = ")
                    .push_bind(second.as_str().to_owned());
            }
        }
        qb.push(" WHERE 1 = 1");
        if let Some(cursor) = cursor {
            let month = cursor.month_stamp().into_inner();
            qb.push(" AND (e.month_stamp < ")
                .push_bind(month)
                .push(" OR (e.month_stamp = ")
                .push_bind(month)
                .push(" AND e.seq < ")
                .push_bind(cursor.seq())
                .push("))");
        }
        match tier {
            Some(Significance::Major) => {
                qb.push(" AND e.is_major = 1 AND e.is_story = 0");
            }
            Some(Significance::Minor) => {
                qb.push(" AND (e.is_major = 0 OR e.is_story = 1)");
            }
            None => {}
        }
        // One extra row tells us whether another page exists.
        qb.push(" ORDER BY e.month_stamp DESC, e.seq DESC LIMIT ")
            .push_bind(i64::from(limit).saturating_add(1));

        let mut rows: Vec<EventRow> = qb.build_query_as().fetch_all(&mut *tx).await?;

        let has_more = rows.len() > page_len;
        rows.truncate(page_len);
        let next_cursor = if has_more {
            rows.last()
                .map(|row| Cursor::new(MonthStamp(row.month_stamp), row.seq))
        } else {
            None
        };

        let mut participants = load_participants(&mut tx, &rows).await?;
        tx.commit().await?;

        let events = rows
            .into_iter()
            .map(|row| {
                let avatars = participants.remove(&row.id).unwrap_or_default();
                row.into_event(avatars)
            })
            .collect();

        Ok(EventPage {
            events,
            next_cursor,
        })
    }

    // -----------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------

    /// Delete events older than `before` (or all events if `None`),
    /// sparing major events when `keep_major` is set. Participant rows
    /// cascade with their event.
    ///
    /// Only ever invoked on explicit user request.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] on failure; nothing is deleted then.
    pub async fn cleanup(
        &self,
        keep_major: bool,
        before: Option<MonthStamp>,
    ) -> Result<u64, DbError> {
        match self.delete_events(keep_major, before).await {
            Ok(deleted) => {
                tracing::info!(
                    path = %self.path.display(),
                    keep_major,
                    before = ?before.map(MonthStamp::into_inner),
                    deleted,
                    "Cleaned up events"
                );
                Ok(deleted)
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to clean up events");
                Err(e)
            }
        }
    }

    async fn delete_events(
        &self,
        keep_major: bool,
        before: Option<MonthStamp>,
    ) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM events WHERE 1 = 1");
        if keep_major {
            qb.push(" AND is_major = 0");
        }
        if let Some(before) = before {
            qb.push(" AND month_stamp < ").push_bind(before.into_inner());
        }
        let result = qb.build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Write a compacted copy of this store to `target`, replacing any
    /// store already there. Used when a session is saved under a new name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the target cannot be prepared or
    /// [`DbError::Sqlite`] if the copy fails.
    pub async fn copy_to(&self, target: &Path) -> Result<(), DbError> {
        let result = self.vacuum_into(target).await;
        match &result {
            Ok(()) => tracing::info!(
                from = %self.path.display(),
                to = %target.display(),
                "Copied event store"
            ),
            Err(e) => tracing::error!(
                from = %self.path.display(),
                to = %target.display(),
                error = %e,
                "Failed to copy event store"
            ),
        }
        result
    }

    async fn vacuum_into(&self, target: &Path) -> Result<(), DbError> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        for stale in [
            target.to_path_buf(),
            sidecar(target, "-wal"),
            sidecar(target, "-shm"),
        ] {
            match tokio::fs::remove_file(&stale).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(DbError::Io(e)),
            }
        }

        sqlx::query("VACUUM INTO ?")
            .bind(target.to_string_lossy().into_owned())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Close every connection to the backing file.
    ///
    /// Idempotent. Subsequent writes fail and reads return empty results.
    pub async fn close(&self) {
        if self.pool.is_closed() {
            return;
        }
        self.pool.close().await;
        tracing::info!(path = %self.path.display(), "Event store closed");
    }
}

/// Fetch the participants of `rows`, keyed by event id, each list in the
/// order the producer supplied it.
async fn load_participants(
    conn: &mut SqliteConnection,
    rows: &[EventRow],
) -> Result<HashMap<String, Vec<AvatarId>>, DbError> {
    let mut participants: HashMap<String, Vec<AvatarId>> = HashMap::with_capacity(rows.len());

    for chunk in rows.chunks(PARTICIPANT_BATCH) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT event_id, avatar_id FROM event_avatars WHERE event_id IN (",
        );
        let mut ids = qb.separated(", ");
        for row in chunk {
            ids.push_bind(row.id.clone());
        }
        ids.push_unseparated(") ORDER BY rowid");

        let links: Vec<(String, String)> = qb.build_query_as().fetch_all(&mut *conn).await?;
        for (event_id, avatar_id) in links {
            participants
                .entry(event_id)
                .or_default()
                .push(AvatarId::new(avatar_id));
        }
    }

    Ok(participants)
}

/// `SQLite` sidecar file (`-wal`, `-shm`) belonging to a database path.
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// A row from the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    seq: i64,
    id: String,
    month_stamp: i64,
    content: String,
    is_major: bool,
    is_story: bool,
    created_at: Option<DateTime<Utc>>,
}

impl EventRow {
    fn into_event(self, participants: Vec<AvatarId>) -> Event {
        Event {
            id: EventId::new(self.id),
            month_stamp: MonthStamp(self.month_stamp),
            content: self.content,
            participants,
            is_major: self.is_major,
            is_story: self.is_story,
            created_at: self.created_at,
        }
    }
}
