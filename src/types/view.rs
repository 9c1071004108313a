use serde::{Deserialize, Serialize};

use super::bookmark::BookmarkCard;
use super::session::Identity;

/// Lifecycle phase of the view-model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Unauthenticated,
    /// Signed in, first fetch not finished yet.
    Loading,
    Ready,
}

/// Which kind of operation produced a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Auth,
    Fetch,
    Write,
}

/// Transient status shown after a failed operation, cleared by the next success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Everything the UI needs to render one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub phase: Phase,
    pub user: Option<Identity>,
    pub search_text: String,
    pub draft_title: String,
    pub draft_url: String,
    /// Visible bookmarks, newest first.
    pub cards: Vec<BookmarkCard>,
    /// Size of the cached set before filtering.
    pub total: usize,
    pub notice: Option<StatusNotice>,
}

impl ViewSnapshot {
    /// True when the empty-state placeholder should be shown instead of the grid.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
