//! The event manager: single entry point for the simulation loop and the
//! history API.
//!
//! [`EventManager`] owns at most one [`EventStore`], the one belonging to
//! the bound save session, and delegates every read and write to it.
//!
//! # Session lifecycle
//!
//! ```text
//!            bind_session(s)
//! Unbound ------------------> Bound(s)
//!    ^                          |  |
//!    |      unbind_session      |  | bind_session(t): open t, close s
//!    +--------------------------+  +-----------------> Bound(t)
//! ```
//!
//! Binding a session whose store file does not exist yet creates the store
//! and, if the session's legacy snapshot holds events, migrates them. Once
//! the file exists (even empty) migration never runs again for that
//! session.
//!
//! While unbound, writes fail with [`EventLogError::NoSession`] and reads
//! return empty results.

use annals_db::{Cursor, EventPage, EventStore, store_exists};
use annals_types::{AvatarId, Event, EventFilter, MonthStamp, SessionId, Significance};
use tokio::sync::RwLock;

use crate::config::{AnnalsConfig, StorageConfig};
use crate::error::EventLogError;
use crate::legacy::{self, LegacySnapshot, MigrationReport};
use crate::session::SessionLayout;

/// Where legacy events come from when a new store is created.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LegacySource {
    /// The session's world snapshot, `{saves_dir}/{session}.json`.
    #[default]
    Snapshot,
    /// Records already in hand.
    Records(Vec<serde_json::Value>),
    /// Start with an empty store.
    Skip,
}

/// What [`EventManager::bind_session`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// A new, empty store was created.
    Created,
    /// An existing store was opened.
    Resumed,
    /// A new store was created and filled from legacy data.
    Migrated(MigrationReport),
}

#[derive(Debug)]
struct BoundSession {
    id: SessionId,
    store: EventStore,
}

/// Owns the event store of the bound session.
#[derive(Debug)]
pub struct EventManager {
    layout: SessionLayout,
    storage: StorageConfig,
    bound: RwLock<Option<BoundSession>>,
}

impl EventManager {
    /// Create an unbound manager storing sessions under `storage.saves_dir`.
    pub fn new(storage: StorageConfig) -> Self {
        Self {
            layout: SessionLayout::new(storage.saves_dir.clone()),
            storage,
            bound: RwLock::new(None),
        }
    }

    /// Create an unbound manager from the full configuration.
    pub fn from_config(config: &AnnalsConfig) -> Self {
        Self::new(config.storage.clone())
    }

    /// File layout of the sessions this manager binds.
    pub const fn layout(&self) -> &SessionLayout {
        &self.layout
    }

    // -----------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------

    /// Bind `session`, importing legacy events from its world snapshot if
    /// its store does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Store`] if the store cannot be opened. The
    /// previous binding, if any, is kept in that case.
    pub async fn bind_session(&self, session: &SessionId) -> Result<BindOutcome, EventLogError> {
        self.bind_session_with(session, LegacySource::Snapshot).await
    }

    /// Bind `session`, taking legacy events from `legacy` if its store does
    /// not exist yet.
    ///
    /// Binding the session that is already bound is a no-op that reports
    /// [`BindOutcome::Resumed`]. Binding another session closes the current
    /// store once the new one is open.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Store`] if the store cannot be opened. The
    /// previous binding, if any, is kept in that case.
    pub async fn bind_session_with(
        &self,
        session: &SessionId,
        legacy: LegacySource,
    ) -> Result<BindOutcome, EventLogError> {
        let mut bound = self.bound.write().await;
        if bound.as_ref().is_some_and(|b| &b.id == session) {
            return Ok(BindOutcome::Resumed);
        }

        let path = self.layout.events_db_path(session);
        let existed = store_exists(&path).await;
        let store = match EventStore::open_with(&self.storage.sqlite_config(&path)).await {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(
                    session = %session,
                    path = %path.display(),
                    error = %e,
                    "Failed to open session event store"
                );
                return Err(e.into());
            }
        };

        let outcome = if existed {
            BindOutcome::Resumed
        } else {
            let records = self.legacy_records(session, legacy).await;
            if records.is_empty() {
                BindOutcome::Created
            } else {
                BindOutcome::Migrated(legacy::migrate(&records, &store).await)
            }
        };

        if let Some(previous) = bound.replace(BoundSession {
            id: session.clone(),
            store,
        }) {
            previous.store.close().await;
            tracing::info!(session = %previous.id, "Session unbound");
        }

        tracing::info!(session = %session, outcome = ?outcome, "Session bound");
        Ok(outcome)
    }

    async fn legacy_records(
        &self,
        session: &SessionId,
        legacy: LegacySource,
    ) -> Vec<serde_json::Value> {
        match legacy {
            LegacySource::Records(records) => records,
            LegacySource::Skip => Vec::new(),
            LegacySource::Snapshot => {
                let path = self.layout.snapshot_path(session);
                match LegacySnapshot::load(&path).await {
                    Ok(Some(snapshot)) => snapshot.events,
                    Ok(None) => Vec::new(),
                    Err(e) => {
                        // Unreadable legacy data still leaves a usable, empty store.
                        tracing::warn!(session = %session, error = %e, "Legacy events not migrated");
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Close the bound store and return to the unbound state.
    ///
    /// Returns the session that was bound. A no-op when already unbound.
    pub async fn unbind_session(&self) -> Option<SessionId> {
        let previous = self.bound.write().await.take()?;
        previous.store.close().await;
        tracing::info!(session = %previous.id, "Session unbound");
        Some(previous.id)
    }

    /// The bound session, if any.
    pub async fn current_session(&self) -> Option<SessionId> {
        self.bound.read().await.as_ref().map(|b| b.id.clone())
    }

    /// Copy the bound session's events to `target`'s store, replacing it.
    ///
    /// Used when the world is saved under a new name. The binding itself
    /// is unchanged; copying onto the bound session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::NoSession`] when unbound, or
    /// [`EventLogError::Store`] if the copy fails.
    pub async fn save_session_as(&self, target: &SessionId) -> Result<(), EventLogError> {
        let bound = self.bound.read().await;
        let Some(current) = bound.as_ref() else {
            return Err(EventLogError::NoSession);
        };
        if &current.id == target {
            return Ok(());
        }
        current
            .store
            .copy_to(&self.layout.events_db_path(target))
            .await?;
        Ok(())
    }

    async fn store(&self) -> Option<EventStore> {
        self.bound.read().await.as_ref().map(|b| b.store.clone())
    }

    // -----------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------

    /// Record an event in the bound session.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::NoSession`] when unbound, or
    /// [`EventLogError::Store`] if the write failed (already logged).
    pub async fn add_event(&self, event: &Event) -> Result<(), EventLogError> {
        let Some(store) = self.store().await else {
            tracing::warn!(event_id = %event.id, "Event dropped: no session bound");
            return Err(EventLogError::NoSession);
        };
        store.add_event(event).await?;
        Ok(())
    }

    /// Delete events on explicit user request; see
    /// [`EventStore::cleanup`].
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::NoSession`] when unbound, or
    /// [`EventLogError::Store`] if nothing could be deleted.
    pub async fn cleanup(
        &self,
        keep_major: bool,
        before: Option<MonthStamp>,
    ) -> Result<u64, EventLogError> {
        let Some(store) = self.store().await else {
            return Err(EventLogError::NoSession);
        };
        Ok(store.cleanup(keep_major, before).await?)
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    /// One page of the newest-first traversal; empty when unbound.
    pub async fn get_events(
        &self,
        filter: &EventFilter,
        cursor: Option<&Cursor>,
        limit: u32,
    ) -> EventPage {
        match self.store().await {
            Some(store) => store.get_events(filter, cursor, limit).await,
            None => EventPage::default(),
        }
    }

    /// Most recent `limit` events of `avatar`, oldest first.
    pub async fn get_events_by_avatar(&self, avatar: &AvatarId, limit: u32) -> Vec<Event> {
        match self.store().await {
            Some(store) => store.get_events_by_avatar(avatar, limit).await,
            None => Vec::new(),
        }
    }

    /// Most recent `limit` events shared by `a` and `b`, oldest first.
    pub async fn get_events_between(&self, a: &AvatarId, b: &AvatarId, limit: u32) -> Vec<Event> {
        match self.store().await {
            Some(store) => store.get_events_between(a, b, limit).await,
            None => Vec::new(),
        }
    }

    /// Long-term memories of `avatar`: major events outside story arcs.
    pub async fn get_major_events_by_avatar(&self, avatar: &AvatarId, limit: u32) -> Vec<Event> {
        self.memory(EventFilter::Avatar(avatar.clone()), Significance::Major, limit)
            .await
    }

    /// Short-term memories of `avatar`: minor events and story beats.
    pub async fn get_minor_events_by_avatar(&self, avatar: &AvatarId, limit: u32) -> Vec<Event> {
        self.memory(EventFilter::Avatar(avatar.clone()), Significance::Minor, limit)
            .await
    }

    /// Long-term memories shared by `a` and `b`.
    pub async fn get_major_events_between(
        &self,
        a: &AvatarId,
        b: &AvatarId,
        limit: u32,
    ) -> Vec<Event> {
        self.memory(EventFilter::Pair(a.clone(), b.clone()), Significance::Major, limit)
            .await
    }

    /// Short-term memories shared by `a` and `b`.
    pub async fn get_minor_events_between(
        &self,
        a: &AvatarId,
        b: &AvatarId,
        limit: u32,
    ) -> Vec<Event> {
        self.memory(EventFilter::Pair(a.clone(), b.clone()), Significance::Minor, limit)
            .await
    }

    async fn memory(&self, filter: EventFilter, tier: Significance, limit: u32) -> Vec<Event> {
        match self.store().await {
            Some(store) => store.get_memory_events(&filter, tier, limit).await,
            None => Vec::new(),
        }
    }

    /// Most recent `limit` events of the session, oldest first.
    pub async fn recent_events(&self, limit: u32) -> Vec<Event> {
        match self.store().await {
            Some(store) => store.recent_events(limit).await,
            None => Vec::new(),
        }
    }

    /// Number of events in the bound session; 0 when unbound.
    pub async fn count(&self) -> u64 {
        match self.store().await {
            Some(store) => store.count().await,
            None => 0,
        }
    }
}
