//! Bookmark Manager for SmartMark.
//!
//! Implements `BookmarkManagerTrait`: owner-scoped insert, list and delete of
//! bookmark rows in SQLite via `rusqlite`. This is the storage behind the
//! offline collaborator; every statement filters on `user_id`, which plays the
//! role of the hosted service's row-level policy.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark};
use crate::types::errors::{FetchError, WriteError};

/// Trait defining bookmark storage operations.
pub trait BookmarkManagerTrait {
    fn add_bookmark(&mut self, new: &NewBookmark) -> Result<Bookmark, WriteError>;
    fn add_bookmark_at(&mut self, new: &NewBookmark, created_at: DateTime<Utc>) -> Result<Bookmark, WriteError>;
    /// Deletes the row if `owner` owns it. Returns whether a row was removed.
    fn remove_bookmark(&mut self, owner: &str, id: &BookmarkId) -> Result<bool, WriteError>;
    /// All rows of `owner`, newest first.
    fn list_bookmarks(&self, owner: &str) -> Result<Vec<Bookmark>, FetchError>;
    fn get_bookmark(&self, owner: &str, id: &BookmarkId) -> Result<Option<Bookmark>, FetchError>;
}

/// Bookmark manager backed by a SQLite connection.
pub struct BookmarkManager<'a> {
    conn: &'a Connection,
}

impl<'a> BookmarkManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Reads a single `Bookmark` row into a struct.
    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        let id: String = row.get(0)?;
        let micros: i64 = row.get(4)?;
        Ok(Bookmark {
            id: BookmarkId::new(id),
            title: row.get(1)?,
            url: row.get(2)?,
            user_id: row.get(3)?,
            created_at: DateTime::from_timestamp_micros(micros).unwrap_or_default(),
        })
    }
}

impl<'a> BookmarkManagerTrait for BookmarkManager<'a> {
    fn add_bookmark(&mut self, new: &NewBookmark) -> Result<Bookmark, WriteError> {
        self.add_bookmark_at(new, Utc::now())
    }

    /// Inserts a row with a generated id. Title and URL are stored as given;
    /// `created_at` is kept at the microsecond precision the column holds.
    fn add_bookmark_at(&mut self, new: &NewBookmark, created_at: DateTime<Utc>) -> Result<Bookmark, WriteError> {
        let id = Uuid::new_v4().to_string();
        let created_at = created_at.trunc_subsecs(6);

        self.conn
            .execute(
                "INSERT INTO bookmarks (id, title, url, user_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, new.title, new.url, new.user_id, created_at.timestamp_micros()],
            )
            .map_err(|e| WriteError::Database(e.to_string()))?;

        Ok(Bookmark {
            id: BookmarkId::new(id),
            title: new.title.clone(),
            url: new.url.clone(),
            user_id: new.user_id.clone(),
            created_at,
        })
    }

    fn remove_bookmark(&mut self, owner: &str, id: &BookmarkId) -> Result<bool, WriteError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2",
                params![id.as_str(), owner],
            )
            .map_err(|e| WriteError::Database(e.to_string()))?;
        Ok(affected > 0)
    }

    /// Equal timestamps fall back to insertion order, newest first.
    fn list_bookmarks(&self, owner: &str) -> Result<Vec<Bookmark>, FetchError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, title, url, user_id, created_at FROM bookmarks \
                 WHERE user_id = ?1 ORDER BY created_at DESC, seq DESC",
            )
            .map_err(|e| FetchError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![owner], Self::row_to_bookmark)
            .map_err(|e| FetchError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| FetchError::Database(e.to_string()))
    }

    fn get_bookmark(&self, owner: &str, id: &BookmarkId) -> Result<Option<Bookmark>, FetchError> {
        let result = self.conn.query_row(
            "SELECT id, title, url, user_id, created_at FROM bookmarks WHERE id = ?1 AND user_id = ?2",
            params![id.as_str(), owner],
            Self::row_to_bookmark,
        );
        match result {
            Ok(bookmark) => Ok(Some(bookmark)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(FetchError::Database(e.to_string())),
        }
    }
}
