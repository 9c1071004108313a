//! Offline collaborator backed by the local SQLite database.
//!
//! Signs in as the identity configured in `LocalSettings` through a simulated
//! redirect: `sign_in_with_oauth` returns the redirect URL with a one-time
//! code already attached, and `complete_oauth` redeems it. Rows are scoped to
//! the signed-in user the same way the hosted row-level policy scopes them.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, info};

use crate::database::connection::Database;
use crate::managers::bookmark_manager::{BookmarkManager, BookmarkManagerTrait};
use crate::managers::session_manager::{SessionManager, SessionManagerTrait};
use crate::services::backend::BookmarkBackend;
use crate::services::crypto_service::{CryptoService, CryptoServiceTrait};
use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark};
use crate::types::errors::{AuthError, FetchError, WriteError};
use crate::types::session::{AuthSession, Identity, OAuthRedirect, PendingOAuth};
use crate::types::settings::LocalSettings;

/// Token stored for offline sessions; nothing ever validates it remotely.
const LOCAL_ACCESS_TOKEN: &str = "local";

/// Collaborator over local SQLite.
pub struct LocalBackend {
    db: Arc<Database>,
    sessions: SessionManager,
    crypto: CryptoService,
    identity: Identity,
    redirect_url: String,
}

impl LocalBackend {
    pub fn new(db: Arc<Database>, sessions: SessionManager, local: &LocalSettings, redirect_url: &str) -> Self {
        Self {
            db,
            sessions,
            crypto: CryptoService::new(),
            identity: Identity {
                id: local.user_id.clone(),
                avatar_url: local.avatar_url.clone(),
            },
            redirect_url: redirect_url.to_string(),
        }
    }

    /// The principal of the stored session, if any.
    fn principal(&self) -> Result<Option<Identity>, AuthError> {
        Ok(self.sessions.load_session()?.map(|s| s.user.clone()))
    }
}

#[async_trait]
impl BookmarkBackend for LocalBackend {
    async fn get_session(&self) -> Result<Option<Identity>, AuthError> {
        self.principal()
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthRedirect, AuthError> {
        let code = self
            .crypto
            .generate_pkce_verifier()
            .map_err(|e| AuthError::SignIn(e.to_string()))?;

        self.sessions.save_pending_oauth(&PendingOAuth {
            code_verifier: code.clone(),
            provider: provider.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        })?;

        let mut url = Url::parse(&self.redirect_url)
            .map_err(|e| AuthError::SignIn(format!("invalid redirect url: {}", e)))?;
        url.query_pairs_mut().append_pair("code", &code);

        debug!(provider, "local sign-in started");
        Ok(OAuthRedirect {
            provider: provider.to_string(),
            url: url.to_string(),
        })
    }

    async fn complete_oauth(&self, code: &str) -> Result<Identity, AuthError> {
        let pending = self
            .sessions
            .take_pending_oauth(chrono::Utc::now().timestamp())?
            .ok_or_else(|| AuthError::Denied("no sign-in in progress".to_string()))?;

        if pending.code_verifier != code {
            return Err(AuthError::Denied("authorization code does not match".to_string()));
        }

        self.sessions.save_session(&AuthSession {
            access_token: LOCAL_ACCESS_TOKEN.to_string(),
            refresh_token: None,
            expires_at: None,
            user: self.identity.clone(),
        })?;

        info!(user_id = %self.identity.id, "local sign-in completed");
        Ok(self.identity.clone())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sessions.clear_session()?;
        Ok(())
    }

    async fn list_bookmarks(&self, owner: &str) -> Result<Vec<Bookmark>, FetchError> {
        let principal = self
            .principal()
            .map_err(|e| FetchError::Database(e.to_string()))?
            .ok_or(FetchError::NotAuthenticated)?;

        if principal.id != owner {
            return Ok(Vec::new());
        }

        let conn = self.db.connection();
        BookmarkManager::new(&conn).list_bookmarks(&principal.id)
    }

    async fn insert_bookmark(&self, record: &NewBookmark) -> Result<Bookmark, WriteError> {
        let principal = self
            .principal()
            .map_err(|e| WriteError::Database(e.to_string()))?
            .ok_or(WriteError::NotAuthenticated)?;

        if principal.id != record.user_id {
            return Err(WriteError::NotOwner(record.user_id.clone()));
        }

        let conn = self.db.connection();
        BookmarkManager::new(&conn).add_bookmark(record)
    }

    async fn delete_bookmark(&self, id: &BookmarkId) -> Result<(), WriteError> {
        let principal = self
            .principal()
            .map_err(|e| WriteError::Database(e.to_string()))?
            .ok_or(WriteError::NotAuthenticated)?;

        let conn = self.db.connection();
        let removed = BookmarkManager::new(&conn).remove_bookmark(&principal.id, id)?;
        if !removed {
            debug!(bookmark_id = %id, "delete matched no rows");
        }
        Ok(())
    }
}
