//! Unit tests for the BookmarkManager public API.
//!
//! Exercises owner-scoped insert, list and delete through the
//! `BookmarkManagerTrait` interface, using an in-memory SQLite database.

use chrono::{Duration, TimeZone, Utc};

use smartmark::database::Database;
use smartmark::managers::bookmark_manager::{BookmarkManager, BookmarkManagerTrait};
use smartmark::types::bookmark::{BookmarkId, NewBookmark};

fn setup() -> Database {
    Database::open_in_memory().expect("Failed to open in-memory database")
}

fn new_bookmark(title: &str, url: &str, owner: &str) -> NewBookmark {
    NewBookmark {
        title: title.to_string(),
        url: url.to_string(),
        user_id: owner.to_string(),
    }
}

#[test]
fn test_add_and_get_bookmark() {
    let db = setup();
    let conn = db.connection();
    let mut mgr = BookmarkManager::new(&conn);

    let created = mgr
        .add_bookmark(&new_bookmark("Example", "https://example.com", "alice"))
        .unwrap();
    assert_eq!(created.title, "Example");
    assert_eq!(created.user_id, "alice");

    let fetched = mgr.get_bookmark("alice", &created.id).unwrap().unwrap();
    assert_eq!(fetched, created);
}

#[test]
fn test_sub_microsecond_timestamp_matches_stored_row() {
    let db = setup();
    let conn = db.connection();
    let mut mgr = BookmarkManager::new(&conn);
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::nanoseconds(501_648_987);

    let created = mgr
        .add_bookmark_at(&new_bookmark("Precise", "https://example.com", "alice"), at)
        .unwrap();
    assert_eq!(created.created_at.timestamp_subsec_nanos(), 501_648_000);
    assert_eq!(mgr.list_bookmarks("alice").unwrap(), vec![created]);
}

/// Rows come back newest first.
#[test]
fn test_list_orders_newest_first() {
    let db = setup();
    let conn = db.connection();
    let mut mgr = BookmarkManager::new(&conn);
    let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let t2 = t1 + Duration::seconds(30);

    mgr.add_bookmark_at(&new_bookmark("Older", "https://a.com", "alice"), t1).unwrap();
    mgr.add_bookmark_at(&new_bookmark("Newer", "https://b.com", "alice"), t2).unwrap();

    let titles: Vec<String> = mgr
        .list_bookmarks("alice")
        .unwrap()
        .into_iter()
        .map(|b| b.title)
        .collect();
    assert_eq!(titles, vec!["Newer", "Older"]);
}

#[test]
fn test_equal_timestamps_list_latest_insert_first() {
    let db = setup();
    let conn = db.connection();
    let mut mgr = BookmarkManager::new(&conn);
    let t = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

    mgr.add_bookmark_at(&new_bookmark("First", "https://a.com", "alice"), t).unwrap();
    mgr.add_bookmark_at(&new_bookmark("Second", "https://b.com", "alice"), t).unwrap();

    let list = mgr.list_bookmarks("alice").unwrap();
    assert_eq!(list[0].title, "Second");
    assert_eq!(list[1].title, "First");
}

#[test]
fn test_created_at_survives_storage() {
    let db = setup();
    let conn = db.connection();
    let mut mgr = BookmarkManager::new(&conn);
    let t = Utc.with_ymd_and_hms(2023, 6, 15, 8, 30, 15).unwrap() + Duration::microseconds(123_456);

    let created = mgr.add_bookmark_at(&new_bookmark("X", "https://x.com", "alice"), t).unwrap();
    let listed = mgr.list_bookmarks("alice").unwrap();
    assert_eq!(listed[0].created_at, t);
    assert_eq!(listed[0].id, created.id);
}

#[test]
fn test_list_is_scoped_to_owner() {
    let db = setup();
    let conn = db.connection();
    let mut mgr = BookmarkManager::new(&conn);

    mgr.add_bookmark(&new_bookmark("Mine", "https://a.com", "alice")).unwrap();
    mgr.add_bookmark(&new_bookmark("Theirs", "https://b.com", "bob")).unwrap();

    let alice = mgr.list_bookmarks("alice").unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].title, "Mine");
    assert!(mgr.list_bookmarks("carol").unwrap().is_empty());
}

#[test]
fn test_remove_requires_ownership() {
    let db = setup();
    let conn = db.connection();
    let mut mgr = BookmarkManager::new(&conn);

    let theirs = mgr.add_bookmark(&new_bookmark("Theirs", "https://b.com", "bob")).unwrap();
    assert!(!mgr.remove_bookmark("alice", &theirs.id).unwrap());
    assert!(mgr.get_bookmark("bob", &theirs.id).unwrap().is_some());
}

#[test]
fn test_remove_twice_is_harmless() {
    let db = setup();
    let conn = db.connection();
    let mut mgr = BookmarkManager::new(&conn);

    let created = mgr.add_bookmark(&new_bookmark("Gone", "https://a.com", "alice")).unwrap();
    assert!(mgr.remove_bookmark("alice", &created.id).unwrap());
    assert!(!mgr.remove_bookmark("alice", &created.id).unwrap());
    assert!(mgr.get_bookmark("alice", &created.id).unwrap().is_none());
}

#[test]
fn test_get_unknown_id_returns_none() {
    let db = setup();
    let conn = db.connection();
    let mgr = BookmarkManager::new(&conn);
    assert!(mgr.get_bookmark("alice", &BookmarkId::from("missing")).unwrap().is_none());
}
