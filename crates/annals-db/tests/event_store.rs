//! Integration tests for the `annals-db` event store.
//!
//! Every test opens a fresh store file in its own temporary directory, so
//! they run in parallel without interfering.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_wrap
)]

use annals_db::{Cursor, DbError, EventPage, EventStore};
use annals_types::{AvatarId, Event, EventFilter, MonthStamp, Significance};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

async fn open_store() -> (TempDir, EventStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = EventStore::open(dir.path().join("world_events.db"))
        .await
        .expect("open store");
    (dir, store)
}

fn event(id: &str, month: i64, participants: &[&str]) -> Event {
    let mut event = Event::new(MonthStamp(month), format!("event {id}"))
        .with_id(id)
        .with_participants(participants.iter().copied());
    event.created_at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).single();
    event
}

fn ids(events: &[Event]) -> Vec<&str> {
    events.iter().map(|e| e.id.as_str()).collect()
}

async fn drain(store: &EventStore, filter: &EventFilter, limit: u32) -> Vec<Event> {
    let mut all = Vec::new();
    let mut cursor: Option<Cursor> = None;
    loop {
        let EventPage {
            events,
            next_cursor,
        } = store.get_events(filter, cursor.as_ref(), limit).await;
        all.extend(events);
        match next_cursor {
            Some(next) => cursor = Some(next),
            None => return all,
        }
    }
}

async fn participant_rows(store: &EventStore) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM event_avatars")
        .fetch_one(store.pool())
        .await
        .unwrap()
}

// =============================================================================
// Writes and round trip
// =============================================================================

#[tokio::test]
async fn stored_event_reads_back_unchanged() {
    let (_dir, store) = open_store().await;
    let original = event("e1", 14, &["alice", "bob"]).major();

    store.add_event(&original).await.unwrap();

    let page = store.get_events(&EventFilter::All, None, 10).await;
    assert_eq!(page.events, vec![original]);
    assert!(!page.has_more());
    assert_eq!(store.count().await, 1);
}

#[tokio::test]
async fn participants_keep_insertion_order_and_drop_repeats() {
    let (_dir, store) = open_store().await;
    store
        .add_event(&event("e1", 1, &["zed", "amy", "zed", "kim"]))
        .await
        .unwrap();

    let page = store.get_events(&EventFilter::All, None, 10).await;
    let names: Vec<&str> = page.events[0]
        .participants
        .iter()
        .map(AvatarId::as_str)
        .collect();
    assert_eq!(names, ["zed", "amy", "kim"]);
}

#[tokio::test]
async fn duplicate_id_is_rejected_and_original_kept() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("dup", 3, &["a"])).await.unwrap();

    let mut clash = event("dup", 9, &["b"]);
    clash.content = "replacement".to_owned();
    let result = store.add_event(&clash).await;

    assert!(matches!(result, Err(DbError::DuplicateEvent(id)) if id.as_str() == "dup"));
    let page = store.get_events(&EventFilter::All, None, 10).await;
    assert_eq!(page.events.len(), 1);
    assert_eq!(page.events[0].content, "event dup");
    assert_eq!(page.events[0].month_stamp, MonthStamp(3));
    assert_eq!(participant_rows(&store).await, 1);
}

#[tokio::test]
async fn failed_participant_write_leaves_no_event() {
    let (_dir, store) = open_store().await;
    sqlx::query(
        "CREATE TRIGGER reject_links BEFORE INSERT ON event_avatars \
         BEGIN SELECT RAISE(ABORT, 'rejected'); END",
    )
    .execute(store.pool())
    .await
    .unwrap();

    let result = store.add_event(&event("e1", 1, &["a", "b"])).await;

    assert!(matches!(result, Err(DbError::Sqlite(_))));
    assert_eq!(store.count().await, 0);
    assert!(store.get_events(&EventFilter::All, None, 10).await.events.is_empty());

    // An event without participants never touches the trigger.
    store.add_event(&event("e2", 1, &[])).await.unwrap();
    assert_eq!(store.count().await, 1);
}

#[tokio::test]
async fn unwritable_store_fails_without_panicking() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("kept", 1, &["a"])).await.unwrap();
    sqlx::query(
        "CREATE TRIGGER read_only BEFORE INSERT ON events \
         BEGIN SELECT RAISE(ABORT, 'read-only'); END",
    )
    .execute(store.pool())
    .await
    .unwrap();

    assert!(store.add_event(&event("lost", 2, &["a"])).await.is_err());

    // Reads keep working on what was already stored.
    let page = store.get_events(&EventFilter::All, None, 10).await;
    assert_eq!(ids(&page.events), ["kept"]);
}

// =============================================================================
// Pagination
// =============================================================================

#[tokio::test]
async fn ties_within_a_month_break_on_insertion_order() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("a", 5, &[])).await.unwrap();
    store.add_event(&event("b", 5, &[])).await.unwrap();
    store.add_event(&event("c", 7, &[])).await.unwrap();

    let first = store.get_events(&EventFilter::All, None, 2).await;
    assert_eq!(ids(&first.events), ["c", "b"]);
    let cursor = first.next_cursor.expect("more pages");

    let second = store.get_events(&EventFilter::All, Some(&cursor), 2).await;
    assert_eq!(ids(&second.events), ["a"]);
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn traversal_visits_every_event_exactly_once() {
    let (_dir, store) = open_store().await;
    // Out-of-order months with plenty of ties.
    let months = [4, 1, 4, 9, 0, 9, 9, 2, 4, 1, 7, 7, 3, 0, 5, 5, 8, 6, 6, 2, 4, 9, 1, 3, 0];
    for (i, month) in months.iter().enumerate() {
        store
            .add_event(&event(&format!("e{i:02}"), *month, &["x"]))
            .await
            .unwrap();
    }

    let everything = store.get_events(&EventFilter::All, None, 1000).await;
    assert_eq!(everything.events.len(), months.len());
    assert!(!everything.has_more());

    for limit in [1, 3, 4, 7, 25, 100] {
        let paged = drain(&store, &EventFilter::All, limit).await;
        assert_eq!(paged, everything.events, "limit {limit}");
    }

    // Newest month first throughout.
    let stamps: Vec<i64> = everything
        .events
        .iter()
        .map(|e| e.month_stamp.into_inner())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn exact_fit_page_reports_no_more() {
    let (_dir, store) = open_store().await;
    for i in 0..3 {
        store.add_event(&event(&format!("e{i}"), i, &[])).await.unwrap();
    }
    let page = store.get_events(&EventFilter::All, None, 3).await;
    assert_eq!(page.events.len(), 3);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn cursor_survives_newer_writes() {
    let (_dir, store) = open_store().await;
    for i in 0..6 {
        store.add_event(&event(&format!("e{i}"), i, &[])).await.unwrap();
    }

    let first = store.get_events(&EventFilter::All, None, 3).await;
    assert_eq!(ids(&first.events), ["e5", "e4", "e3"]);

    store.add_event(&event("late", 10, &[])).await.unwrap();
    store.add_event(&event("same_month", 3, &[])).await.unwrap();

    let second = store
        .get_events(&EventFilter::All, first.next_cursor.as_ref(), 10)
        .await;
    assert_eq!(ids(&second.events), ["e2", "e1", "e0"]);
}

#[tokio::test]
async fn cursor_token_round_trips_through_pages() {
    let (_dir, store) = open_store().await;
    for i in 0..4 {
        store.add_event(&event(&format!("e{i}"), 1, &[])).await.unwrap();
    }
    let first = store.get_events(&EventFilter::All, None, 2).await;
    let token = first.next_cursor.unwrap().encode();

    let cursor = Cursor::decode(&token).unwrap();
    let second = store.get_events(&EventFilter::All, Some(&cursor), 2).await;
    assert_eq!(ids(&second.events), ["e1", "e0"]);
}

#[tokio::test]
async fn zero_limit_reads_nothing() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("e1", 1, &[])).await.unwrap();
    assert_eq!(store.get_events(&EventFilter::All, None, 0).await, EventPage::default());
}

// =============================================================================
// Filters
// =============================================================================

#[tokio::test]
async fn avatar_filter_matches_participation() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("ab", 1, &["a", "b"])).await.unwrap();
    store.add_event(&event("bc", 2, &["b", "c"])).await.unwrap();
    store.add_event(&event("c", 3, &["c"])).await.unwrap();

    let page = store
        .get_events(&EventFilter::Avatar(AvatarId::new("b")), None, 10)
        .await;
    assert_eq!(ids(&page.events), ["bc", "ab"]);
    // Filtered events still carry their full participant list.
    assert_eq!(page.events[0].participants.len(), 2);
}

#[tokio::test]
async fn pair_filter_is_an_intersection() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("ab", 1, &["a", "b"])).await.unwrap();
    store.add_event(&event("a", 2, &["a"])).await.unwrap();
    store.add_event(&event("b", 3, &["b"])).await.unwrap();
    store.add_event(&event("abc", 4, &["c", "b", "a"])).await.unwrap();

    let pair = EventFilter::Pair(AvatarId::new("a"), AvatarId::new("b"));
    let page = store.get_events(&pair, None, 10).await;
    assert_eq!(ids(&page.events), ["abc", "ab"]);

    let paged = drain(&store, &pair, 1).await;
    assert_eq!(ids(&paged), ["abc", "ab"]);
}

#[tokio::test]
async fn convenience_reads_return_recent_events_oldest_first() {
    let (_dir, store) = open_store().await;
    for i in 0..5 {
        store
            .add_event(&event(&format!("e{i}"), i, &["a", "b"]))
            .await
            .unwrap();
    }
    store.add_event(&event("solo", 9, &["a"])).await.unwrap();

    let a = AvatarId::new("a");
    let b = AvatarId::new("b");
    assert_eq!(ids(&store.get_events_by_avatar(&a, 3).await), ["e3", "e4", "solo"]);
    assert_eq!(ids(&store.get_events_between(&a, &b, 2).await), ["e3", "e4"]);
    assert_eq!(ids(&store.recent_events(2).await), ["e4", "solo"]);
}

#[tokio::test]
async fn memory_tiers_split_major_from_story() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("minor", 1, &["a"])).await.unwrap();
    store.add_event(&event("major", 2, &["a"]).major()).await.unwrap();
    store
        .add_event(&event("story", 3, &["a"]).major().story())
        .await
        .unwrap();
    store.add_event(&event("tale", 4, &["a"]).story()).await.unwrap();

    let a = EventFilter::Avatar(AvatarId::new("a"));
    let major = store.get_memory_events(&a, Significance::Major, 10).await;
    let minor = store.get_memory_events(&a, Significance::Minor, 10).await;

    assert_eq!(ids(&major), ["major"]);
    assert_eq!(ids(&minor), ["minor", "story", "tale"]);
    assert!(major.iter().all(|e| Significance::Major.admits(e)));
    assert!(minor.iter().all(|e| Significance::Minor.admits(e)));
}

// =============================================================================
// Cleanup
// =============================================================================

#[tokio::test]
async fn cleanup_spares_major_events_and_cascades() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("old_minor", 1, &["a", "b"])).await.unwrap();
    store.add_event(&event("old_major", 2, &["a"]).major()).await.unwrap();
    store.add_event(&event("new_minor", 8, &["b"])).await.unwrap();

    let deleted = store.cleanup(true, Some(MonthStamp(5))).await.unwrap();

    assert_eq!(deleted, 1);
    let remaining = store.get_events(&EventFilter::All, None, 10).await;
    assert_eq!(ids(&remaining.events), ["new_minor", "old_major"]);
    assert_eq!(participant_rows(&store).await, 2);
}

#[tokio::test]
async fn cleanup_without_conditions_empties_the_store() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("a", 1, &["x"])).await.unwrap();
    store.add_event(&event("b", 2, &["x"]).major()).await.unwrap();

    assert_eq!(store.cleanup(false, None).await.unwrap(), 2);
    assert_eq!(store.count().await, 0);
    assert_eq!(participant_rows(&store).await, 0);
}

#[tokio::test]
async fn cleanup_keep_major_without_cutoff_drops_all_minor() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("a", 1, &[])).await.unwrap();
    store.add_event(&event("b", 200, &[])).await.unwrap();
    store.add_event(&event("c", 3, &[]).major()).await.unwrap();

    assert_eq!(store.cleanup(true, None).await.unwrap(), 2);
    assert_eq!(ids(&store.recent_events(10).await), ["c"]);
}

#[tokio::test]
async fn deleted_sequence_numbers_are_not_reused() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("a", 1, &[])).await.unwrap();
    store.add_event(&event("b", 1, &[])).await.unwrap();
    let before = store.get_events(&EventFilter::All, None, 1).await;
    let cursor = before.next_cursor.unwrap();

    store.cleanup(false, None).await.unwrap();
    store.add_event(&event("c", 1, &[])).await.unwrap();

    // The new row sorts ahead of the stale cursor position.
    let after = store.get_events(&EventFilter::All, Some(&cursor), 10).await;
    assert!(after.events.is_empty());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn reopening_keeps_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("w_events.db");

    let store = EventStore::open(&path).await.unwrap();
    store.add_event(&event("e1", 1, &["a"])).await.unwrap();
    store.close().await;

    let reopened = EventStore::open(&path).await.unwrap();
    assert_eq!(reopened.count().await, 1);
    assert_eq!(reopened.path(), path.as_path());
}

#[tokio::test]
async fn closed_store_degrades_gracefully() {
    let (_dir, store) = open_store().await;
    store.add_event(&event("e1", 1, &[])).await.unwrap();

    store.close().await;
    store.close().await;

    assert!(store.is_closed());
    assert!(matches!(
        store.add_event(&event("e2", 2, &[])).await,
        Err(DbError::Sqlite(_))
    ));
    assert!(store.get_events(&EventFilter::All, None, 10).await.events.is_empty());
    assert!(store.recent_events(10).await.is_empty());
    assert_eq!(store.count().await, 0);
    assert!(store.cleanup(false, None).await.is_err());
}

#[tokio::test]
async fn copy_to_writes_an_independent_store() {
    let (dir, store) = open_store().await;
    store.add_event(&event("e1", 1, &["a"])).await.unwrap();
    store.add_event(&event("e2", 2, &["a", "b"])).await.unwrap();

    let target = dir.path().join("copy_events.db");
    // Pre-existing target is replaced, not merged.
    let stale = EventStore::open(&target).await.unwrap();
    stale.add_event(&event("stale", 9, &[])).await.unwrap();
    stale.close().await;

    store.copy_to(&target).await.unwrap();
    store.add_event(&event("e3", 3, &[])).await.unwrap();

    let copy = EventStore::open(&target).await.unwrap();
    let events = copy.get_events(&EventFilter::All, None, 10).await.events;
    assert_eq!(ids(&events), ["e2", "e1"]);
    assert_eq!(events[0].participants.len(), 2);
    assert_eq!(store.count().await, 3);
}
