//! Bookmark view-model for SmartMark.
//!
//! Owns the session state of one browsing context (signed-in identity, cached
//! bookmarks, search text, new-bookmark draft) and synchronizes it with a
//! [`BookmarkBackend`]. The UI renders [`BookmarkViewModel::snapshot`] and
//! nothing else.
//!
//! Write policy: no optimistic updates. Every insert or delete is followed by
//! a full refetch, so the cache only ever holds what the backend returned.
//! Failures never corrupt state: a failed fetch keeps the previous cache, a
//! failed write is re-synchronized away by the refetch. Each failure is
//! returned to the caller, logged, and shown as a transient notice.
//!
//! Every backend call is bounded by the request timeout. Dropping an
//! operation future before it resolves cancels the call; state is only
//! written after the backend answers, so a cancelled call changes nothing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::services::backend::BookmarkBackend;
use crate::types::bookmark::{Bookmark, BookmarkCard, BookmarkId, NewBookmark};
use crate::types::errors::{AuthError, FetchError, WriteError};
use crate::types::session::{Identity, OAuthCallback, OAuthRedirect};
use crate::types::view::{NoticeKind, Phase, StatusNotice, ViewSnapshot};

/// Result of `add_bookmark`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Title or URL was blank; nothing was sent and nothing changed.
    Ignored,
    /// The backend created the record.
    Saved(BookmarkId),
}

/// Runs `fut`, failing with `on_timeout` if it takes longer than `limit`.
async fn bounded<T, E>(
    limit: Duration,
    fut: impl Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit)),
    }
}

/// The bookmark collection view-model.
pub struct BookmarkViewModel {
    backend: Arc<dyn BookmarkBackend>,
    provider: String,
    request_timeout: Duration,
    phase: Phase,
    current_user: Option<Identity>,
    bookmarks: Vec<Bookmark>,
    search_text: String,
    draft_title: String,
    draft_url: String,
    notice: Option<StatusNotice>,
    torn_down: bool,
}

impl BookmarkViewModel {
    /// Creates an unauthenticated view-model that signs in with `provider`.
    pub fn new(backend: Arc<dyn BookmarkBackend>, provider: &str, request_timeout: Duration) -> Self {
        Self {
            backend,
            provider: provider.to_string(),
            request_timeout,
            phase: Phase::Unauthenticated,
            current_user: None,
            bookmarks: Vec::new(),
            search_text: String::new(),
            draft_title: String::new(),
            draft_url: String::new(),
            notice: None,
            torn_down: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_user(&self) -> Option<&Identity> {
        self.current_user.as_ref()
    }

    /// The cached set, newest first.
    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn draft_title(&self) -> &str {
        &self.draft_title
    }

    pub fn draft_url(&self) -> &str {
        &self.draft_url
    }

    pub fn notice(&self) -> Option<&StatusNotice> {
        self.notice.as_ref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn set_notice(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notice = Some(StatusNotice {
            kind,
            message: message.into(),
        });
    }

    fn clear_session_state(&mut self) {
        self.current_user = None;
        self.bookmarks.clear();
        self.search_text.clear();
        self.draft_title.clear();
        self.draft_url.clear();
        self.phase = Phase::Unauthenticated;
    }

    /// Signs `identity` in locally and loads its bookmarks.
    async fn enter_session(&mut self, identity: Identity) {
        info!(user_id = %identity.id, "session established");
        self.current_user = Some(identity);
        self.bookmarks.clear();
        self.phase = Phase::Loading;
        self.notice = None;
        // A failed first fetch is recorded in the notice; the session stands.
        let _ = self.refresh().await;
    }

    /// Looks up an existing session and, if there is one, loads its bookmarks.
    ///
    /// A missing session and a failed lookup both leave the view-model
    /// unauthenticated; the failure is returned and shown as a notice.
    pub async fn restore_session(&mut self) -> Result<(), AuthError> {
        if self.torn_down {
            return Ok(());
        }

        let lookup = bounded(self.request_timeout, self.backend.get_session(), AuthError::Timeout).await;
        match lookup {
            Ok(Some(identity)) => {
                self.enter_session(identity).await;
                Ok(())
            }
            Ok(None) => {
                debug!("no existing session");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "session lookup failed, treating as signed out");
                self.set_notice(NoticeKind::Auth, e.to_string());
                Err(e)
            }
        }
    }

    /// Starts the OAuth redirect flow. No local state changes.
    pub async fn login(&mut self) -> Result<OAuthRedirect, AuthError> {
        if self.torn_down {
            return Err(AuthError::SignIn("view-model has been torn down".to_string()));
        }
        bounded(
            self.request_timeout,
            self.backend.sign_in_with_oauth(&self.provider),
            AuthError::Timeout,
        )
        .await
    }

    /// Finishes the OAuth flow once the provider redirected back.
    ///
    /// `callback` is either the full redirect URL or the bare authorization code.
    pub async fn complete_login(&mut self, callback: &str) -> Result<Identity, AuthError> {
        if self.torn_down {
            return Err(AuthError::SignIn("view-model has been torn down".to_string()));
        }

        let code = match OAuthCallback::from_redirect_url(callback) {
            Some(OAuthCallback::Code(code)) => code,
            Some(OAuthCallback::Denied(reason)) => {
                self.set_notice(NoticeKind::Auth, reason.clone());
                return Err(AuthError::Denied(reason));
            }
            None if !callback.trim().is_empty() && !callback.contains("://") => callback.trim().to_string(),
            None => {
                let e = AuthError::Denied("redirect carried no authorization code".to_string());
                self.set_notice(NoticeKind::Auth, e.to_string());
                return Err(e);
            }
        };

        match bounded(self.request_timeout, self.backend.complete_oauth(&code), AuthError::Timeout).await {
            Ok(identity) => {
                self.enter_session(identity.clone()).await;
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "OAuth completion failed");
                self.set_notice(NoticeKind::Auth, e.to_string());
                Err(e)
            }
        }
    }

    /// Ends the session. Local state is cleared whether or not the provider
    /// confirmed; a provider failure is only logged and returned.
    pub async fn logout(&mut self) -> Result<(), AuthError> {
        if self.torn_down {
            return Ok(());
        }
        let result = bounded(self.request_timeout, self.backend.sign_out(), AuthError::Timeout).await;
        if let Err(e) = &result {
            warn!(error = %e, "sign-out failed at provider, clearing local session anyway");
        }
        self.clear_session_state();
        self.notice = None;
        info!("signed out");
        result
    }

    /// Refetches the signed-in user's bookmarks and replaces the cache.
    ///
    /// On failure the previous cache stays. Rows owned by another user are
    /// dropped. Returns the number of cached bookmarks.
    pub async fn refresh(&mut self) -> Result<usize, FetchError> {
        let Some(user) = self.current_user.clone() else {
            return Err(FetchError::NotAuthenticated);
        };

        let fetched = bounded(
            self.request_timeout,
            self.backend.list_bookmarks(&user.id),
            FetchError::Timeout,
        )
        .await;

        match fetched {
            Ok(rows) => {
                let total = rows.len();
                let mut mine: Vec<Bookmark> = rows.into_iter().filter(|b| b.user_id == user.id).collect();
                if mine.len() != total {
                    warn!(
                        user_id = %user.id,
                        dropped = total - mine.len(),
                        "backend returned bookmarks owned by another user"
                    );
                }
                // Stable: rows with equal timestamps keep the backend's order.
                mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));

                debug!(user_id = %user.id, count = mine.len(), "bookmarks refreshed");
                self.bookmarks = mine;
                self.phase = Phase::Ready;
                self.notice = None;
                Ok(self.bookmarks.len())
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "bookmark refresh failed, keeping cached list");
                self.set_notice(NoticeKind::Fetch, e.to_string());
                Err(e)
            }
        }
    }

    /// Creates a bookmark, then refetches.
    ///
    /// Blank (after trimming) title or URL is ignored without any I/O. Once a
    /// write is attempted the draft is cleared, even if the write fails.
    pub async fn add_bookmark(&mut self, title: &str, url: &str) -> Result<AddOutcome, WriteError> {
        let (title, url) = (title.trim(), url.trim());
        if title.is_empty() || url.is_empty() {
            return Ok(AddOutcome::Ignored);
        }

        let Some(user) = self.current_user.clone() else {
            return Err(WriteError::NotAuthenticated);
        };

        let record = NewBookmark {
            title: title.to_string(),
            url: url.to_string(),
            user_id: user.id.clone(),
        };
        let written = bounded(
            self.request_timeout,
            self.backend.insert_bookmark(&record),
            WriteError::Timeout,
        )
        .await;

        self.draft_title.clear();
        self.draft_url.clear();
        let _ = self.refresh().await;

        match written {
            Ok(created) => {
                info!(user_id = %user.id, bookmark_id = %created.id, "bookmark created");
                Ok(AddOutcome::Saved(created.id))
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "bookmark create failed");
                self.set_notice(NoticeKind::Write, e.to_string());
                Err(e)
            }
        }
    }

    /// Submits the draft form.
    pub async fn submit_draft(&mut self) -> Result<AddOutcome, WriteError> {
        let (title, url) = (self.draft_title.clone(), self.draft_url.clone());
        self.add_bookmark(&title, &url).await
    }

    /// Deletes a bookmark, then refetches regardless of the outcome.
    pub async fn delete_bookmark(&mut self, id: &BookmarkId) -> Result<(), WriteError> {
        let Some(user) = self.current_user.clone() else {
            return Err(WriteError::NotAuthenticated);
        };

        let deleted = bounded(
            self.request_timeout,
            self.backend.delete_bookmark(id),
            WriteError::Timeout,
        )
        .await;

        let _ = self.refresh().await;

        match deleted {
            Ok(()) => {
                info!(user_id = %user.id, bookmark_id = %id, "bookmark deleted");
                Ok(())
            }
            Err(e) => {
                warn!(user_id = %user.id, bookmark_id = %id, error = %e, "bookmark delete failed");
                self.set_notice(NoticeKind::Write, e.to_string());
                Err(e)
            }
        }
    }

    pub fn set_search_text(&mut self, text: &str) {
        if self.torn_down {
            return;
        }
        self.search_text = text.to_string();
    }

    pub fn set_draft_title(&mut self, text: &str) {
        if self.torn_down {
            return;
        }
        self.draft_title = text.to_string();
    }

    pub fn set_draft_url(&mut self, text: &str) {
        if self.torn_down {
            return;
        }
        self.draft_url = text.to_string();
    }

    /// Cached bookmarks whose title contains the search text, ignoring case.
    pub fn visible_bookmarks(&self) -> Vec<&Bookmark> {
        self.bookmarks
            .iter()
            .filter(|b| b.title_matches(&self.search_text))
            .collect()
    }

    /// The render state for the UI.
    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            phase: self.phase,
            user: self.current_user.clone(),
            search_text: self.search_text.clone(),
            draft_title: self.draft_title.clone(),
            draft_url: self.draft_url.clone(),
            cards: self
                .visible_bookmarks()
                .into_iter()
                .map(BookmarkCard::from_bookmark)
                .collect(),
            total: self.bookmarks.len(),
            notice: self.notice.clone(),
        }
    }

    /// Ends the component lifecycle. Local state is dropped and later calls
    /// become no-ops; the remote session is left alone.
    pub fn teardown(&mut self) {
        if !self.torn_down {
            debug!("view-model torn down");
        }
        self.torn_down = true;
        self.clear_session_state();
        self.notice = None;
    }
}
