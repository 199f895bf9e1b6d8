//! REST API endpoint handlers for the history API.
//!
//! All handlers go through the shared [`EventManager`](annals_core::EventManager)
//! in [`AppState`]; none touches a store file directly.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/events` | Newest-first event page, filtered by avatar or pair |
//! | `DELETE` | `/api/events/cleanup` | Delete old events on user request |
//! | `GET` | `/api/session` | Bound session and event count |

use std::sync::Arc;

use annals_db::{Cursor, EventPage};
use annals_types::{AvatarId, Event, EventFilter, MonthStamp};
use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use annals_core::EventLogError;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /api/events` endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Events involving this avatar.
    pub avatar_id: Option<String>,
    /// First avatar of a pair filter; requires `avatar_id_2`.
    pub avatar_id_1: Option<String>,
    /// Second avatar of a pair filter; requires `avatar_id_1`.
    pub avatar_id_2: Option<String>,
    /// Opaque token from a previous response.
    pub cursor: Option<String>,
    /// Page size (default 100).
    pub limit: Option<i64>,
}

impl EventsQuery {
    /// Resolve the avatar parameters into a filter. A complete pair wins
    /// over `avatar_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::InvalidQuery`] when only one half of the
    /// pair is supplied.
    pub fn filter(&self) -> Result<EventFilter, ObserverError> {
        let avatar = non_empty(self.avatar_id.as_deref());
        let first = non_empty(self.avatar_id_1.as_deref());
        let second = non_empty(self.avatar_id_2.as_deref());
        if first.is_some() != second.is_some() {
            return Err(ObserverError::InvalidQuery(
                "avatar_id_1 and avatar_id_2 must be supplied together".to_owned(),
            ));
        }
        Ok(EventFilter::resolve(avatar, (first, second)))
    }
}

fn non_empty(value: Option<&str>) -> Option<AvatarId> {
    value.filter(|v| !v.is_empty()).map(AvatarId::new)
}

/// Query parameters for the `DELETE /api/events/cleanup` endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct CleanupQuery {
    /// Spare major events (default `true`).
    pub keep_major: Option<bool>,
    /// Only delete events strictly older than this month.
    pub before_month_stamp: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// One event as presented to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventView {
    /// Event id.
    pub id: String,
    /// Display string, `"Year {y}, Month {m}: {content}"`.
    pub text: String,
    /// Narrative payload.
    pub content: String,
    /// Simulation year.
    pub year: i64,
    /// Simulation month, 1 to 12.
    pub month: u8,
    /// Raw ordering key.
    pub month_stamp: i64,
    /// Participating avatars.
    pub related_avatar_ids: Vec<String>,
    /// Long-term significance.
    pub is_major: bool,
    /// Narrative-arc significance.
    pub is_story: bool,
    /// Real-world insertion time, when known.
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        let text = event.display_text();
        Self {
            id: event.id.into_inner(),
            text,
            year: event.month_stamp.year(),
            month: event.month_stamp.month(),
            month_stamp: event.month_stamp.into_inner(),
            content: event.content,
            related_avatar_ids: event
                .participants
                .into_iter()
                .map(AvatarId::into_inner)
                .collect(),
            is_major: event.is_major,
            is_story: event.is_story,
            created_at: event.created_at,
        }
    }
}

/// Body of `GET /api/events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventsResponse {
    /// Events, newest first.
    pub events: Vec<EventView>,
    /// Token for the next page; `null` when exhausted.
    pub next_cursor: Option<String>,
    /// Whether another page exists.
    pub has_more: bool,
}

impl From<EventPage> for EventsResponse {
    fn from(page: EventPage) -> Self {
        Self {
            has_more: page.has_more(),
            next_cursor: page.next_cursor.map(|c| c.encode()),
            events: page.events.into_iter().map(EventView::from).collect(),
        }
    }
}

/// Body of `DELETE /api/events/cleanup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupResponse {
    /// Number of events deleted.
    pub deleted: u64,
    /// Why nothing was deleted, when no session is bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `GET /api/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionResponse {
    /// Bound session, or `null`.
    pub session: Option<String>,
    /// Events stored for it.
    pub event_count: u64,
}

// ---------------------------------------------------------------------------
// GET /api/events
// ---------------------------------------------------------------------------

/// Page through the bound session's events, newest first.
///
/// # Query Parameters
///
/// - `avatar_id`: events involving this avatar.
/// - `avatar_id_1`, `avatar_id_2`: events involving both (takes
///   precedence over `avatar_id`).
/// - `cursor`: token from a previous page; a malformed token restarts at
///   the newest event.
/// - `limit`: page size (default 100, clamped to the configured maximum).
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ObserverError> {
    let limit = state.pages.resolve(params.limit)?;
    let filter = params.filter()?;
    let cursor = Cursor::decode_lenient(params.cursor.as_deref());

    let page = state.events.get_events(&filter, cursor.as_ref(), limit).await;
    Ok(Json(EventsResponse::from(page)))
}

// ---------------------------------------------------------------------------
// DELETE /api/events/cleanup
// ---------------------------------------------------------------------------

/// Delete events on explicit user request.
///
/// # Query Parameters
///
/// - `keep_major`: spare major events (default `true`).
/// - `before_month_stamp`: only delete events older than this month; all
///   events when absent.
pub async fn cleanup_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CleanupQuery>,
) -> Result<Json<CleanupResponse>, ObserverError> {
    let keep_major = params.keep_major.unwrap_or(true);
    let before = params.before_month_stamp.map(MonthStamp);

    match state.events.cleanup(keep_major, before).await {
        Ok(deleted) => Ok(Json(CleanupResponse {
            deleted,
            error: None,
        })),
        Err(EventLogError::NoSession) => Ok(Json(CleanupResponse {
            deleted: 0,
            error: Some("No world loaded".to_owned()),
        })),
        Err(e) => Err(ObserverError::Internal(format!("cleanup failed: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// GET /api/session
// ---------------------------------------------------------------------------

/// Report the bound session and how many events it holds.
pub async fn session_status(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let session = state.events.current_session().await;
    let event_count = state.events.count().await;
    Json(SessionResponse {
        session: session.map(|s| s.to_string()),
        event_count,
    })
}
