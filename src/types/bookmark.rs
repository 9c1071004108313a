use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Favicon lookup used for bookmark cards.
pub const FAVICON_ENDPOINT: &str = "https://www.google.com/s2/favicons?domain=";

/// Opaque bookmark identifier assigned by the persistence service.
///
/// The key type of the remote table is not ours to choose, so both JSON
/// strings (uuid keys) and JSON integers (bigint keys) are accepted and kept
/// as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookmarkId(String);

impl BookmarkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookmarkId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BookmarkId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Serialize for BookmarkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BookmarkId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Integer(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Integer(n) => Self(n.to_string()),
        })
    }
}

/// A user-owned bookmark row as returned by the persistence service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub title: String,
    pub url: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    /// Case-insensitive substring match of the title against `needle`.
    ///
    /// An empty needle matches every bookmark.
    pub fn title_matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// Insert payload for a new bookmark. The service assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub user_id: String,
}

/// Display projection of a bookmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkCard {
    pub id: BookmarkId,
    pub title: String,
    pub url: String,
    /// Hostname of `url`, or `None` when the URL is not absolute or has no host.
    pub domain: Option<String>,
    pub favicon_url: Option<String>,
}

impl BookmarkCard {
    pub fn from_bookmark(bookmark: &Bookmark) -> Self {
        let domain = derive_domain(&bookmark.url);
        let favicon_url = domain
            .as_ref()
            .map(|d| format!("{}{}", FAVICON_ENDPOINT, d));

        Self {
            id: bookmark.id.clone(),
            title: bookmark.title.clone(),
            url: bookmark.url.clone(),
            domain,
            favicon_url,
        }
    }
}

/// Extracts the hostname from an absolute URL.
///
/// Returns `None` for relative or malformed URLs and for URLs without a host
/// (`mailto:`, `data:`), so callers render the raw URL instead.
pub fn derive_domain(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .filter(|host| !host.is_empty())
}
