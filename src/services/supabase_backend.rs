//! Supabase collaborator for SmartMark.
//!
//! Talks to a hosted Supabase project over HTTPS: GoTrue (`/auth/v1`) for the
//! OAuth PKCE flow and session lookup, PostgREST (`/rest/v1`) for the bookmark
//! table. Tokens are kept encrypted by the session manager; row access is
//! enforced by the project's row-level security policy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::managers::session_manager::{SessionManager, SessionManagerTrait};
use crate::services::backend::BookmarkBackend;
use crate::services::crypto_service::{pkce_challenge, CryptoService, CryptoServiceTrait};
use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark};
use crate::types::errors::{AuthError, FetchError, WriteError};
use crate::types::session::{AuthSession, Identity, OAuthRedirect, PendingOAuth};
use crate::types::settings::AppSettings;

/// Refresh the access token when it expires within this many seconds.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// User object returned by GoTrue.
#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

impl GoTrueUser {
    fn to_identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            avatar_url: self
                .user_metadata
                .get("avatar_url")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

/// Token grant response (`pkce` and `refresh_token` grants).
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: GoTrueUser,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> AuthSession {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs));
        AuthSession {
            user: self.user.to_identity(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// Outcome of `GET /auth/v1/user`.
enum UserLookup {
    Found(Identity),
    Unauthorized,
}

/// Collaborator over Supabase REST.
pub struct SupabaseBackend {
    http: Client,
    base_url: String,
    anon_key: String,
    table: String,
    redirect_url: String,
    sessions: SessionManager,
    crypto: CryptoService,
}

impl SupabaseBackend {
    pub fn new(settings: &AppSettings, sessions: SessionManager) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.network.request_timeout_secs.max(1)))
            .user_agent(concat!("smartmark/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.backend.supabase_url.trim_end_matches('/').to_string(),
            anon_key: settings.backend.anon_key.clone(),
            table: settings.backend.table.clone(),
            redirect_url: settings.auth.redirect_url.clone(),
            sessions,
            crypto: CryptoService::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn table_endpoint(&self) -> String {
        self.endpoint(&format!("/rest/v1/{}", self.table))
    }

    /// Attaches the project key every request needs.
    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.anon_key)
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Reads the error text of a failed response; the body shape differs
    /// between GoTrue (`msg`, `error_description`) and PostgREST (`message`).
    async fn error_message(response: Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                ["message", "msg", "error_description", "error"]
                    .iter()
                    .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_string))
            })
            .unwrap_or_else(|| {
                if body.is_empty() {
                    status.canonical_reason().unwrap_or("unknown error").to_string()
                } else {
                    body
                }
            })
    }

    async fn fetch_user(&self, access_token: &str) -> Result<UserLookup, AuthError> {
        let response = self
            .with_key(self.http.get(self.endpoint("/auth/v1/user")))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::SessionLookup(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(UserLookup::Unauthorized),
            status if status.is_success() => {
                let user: GoTrueUser = response
                    .json()
                    .await
                    .map_err(|e| AuthError::SessionLookup(format!("bad user payload: {}", e)))?;
                Ok(UserLookup::Found(user.to_identity()))
            }
            _ => Err(AuthError::SessionLookup(Self::error_message(response).await)),
        }
    }

    async fn token_grant<T: Serialize + ?Sized>(&self, grant_type: &str, body: &T) -> Result<AuthSession, AuthError> {
        let response = self
            .with_key(self.http.post(self.endpoint("/auth/v1/token")))
            .query(&[("grant_type", grant_type)])
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::SignIn(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = Self::error_message(response).await;
            return Err(if status.is_client_error() {
                AuthError::Denied(message)
            } else {
                AuthError::SignIn(message)
            });
        }

        let grant: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::SignIn(format!("bad token payload: {}", e)))?;
        let session = grant.into_session(Self::now());
        self.sessions.save_session(&session)?;
        Ok(session)
    }

    /// Exchanges the stored refresh token for a new session. Drops the stored
    /// session when the provider rejects the refresh token.
    async fn refresh(&self, session: &AuthSession) -> Result<Option<AuthSession>, AuthError> {
        let Some(refresh_token) = session.refresh_token.clone() else {
            self.sessions.clear_session()?;
            return Ok(None);
        };

        match self
            .token_grant("refresh_token", &RefreshGrant { refresh_token: &refresh_token })
            .await
        {
            Ok(fresh) => {
                debug!(user_id = %fresh.user.id, "access token refreshed");
                Ok(Some(fresh))
            }
            Err(AuthError::Denied(reason)) => {
                warn!(%reason, "refresh token rejected, signing out locally");
                self.sessions.clear_session()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The stored session with a usable access token, refreshing if needed.
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let Some(session) = self.sessions.load_session()? else {
            return Ok(None);
        };
        if session.is_expired(Self::now(), EXPIRY_LEEWAY_SECS) {
            return self.refresh(&session).await;
        }
        Ok(Some(session))
    }

    /// Sends the request `build` makes for an access token. A 401 answer
    /// triggers one refresh and one resend with the new token. `Ok(None)`
    /// means there is no usable session.
    async fn send_authorized<F>(&self, build: F) -> Result<Option<Response>, String>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let Some(session) = self.current_session().await.map_err(|e| e.to_string())? else {
            return Ok(None);
        };

        let response = build(&session.access_token).send().await.map_err(|e| e.to_string())?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(Some(response));
        }

        debug!(user_id = %session.user.id, "access token rejected, refreshing once");
        let Some(fresh) = self.refresh(&session).await.map_err(|e| e.to_string())? else {
            return Ok(None);
        };
        build(&fresh.access_token)
            .send()
            .await
            .map(Some)
            .map_err(|e| e.to_string())
    }

    async fn write_error(response: Response) -> WriteError {
        let status = response.status().as_u16();
        let message = Self::error_message(response).await;
        WriteError::Rejected { status, message }
    }
}

#[async_trait]
impl BookmarkBackend for SupabaseBackend {
    async fn get_session(&self) -> Result<Option<Identity>, AuthError> {
        let Some(session) = self.current_session().await? else {
            return Ok(None);
        };

        match self.fetch_user(&session.access_token).await? {
            UserLookup::Found(identity) => Ok(Some(identity)),
            UserLookup::Unauthorized => {
                // Revoked server-side before its expiry; one refresh attempt.
                let Some(fresh) = self.refresh(&session).await? else {
                    return Ok(None);
                };
                match self.fetch_user(&fresh.access_token).await? {
                    UserLookup::Found(identity) => Ok(Some(identity)),
                    UserLookup::Unauthorized => {
                        self.sessions.clear_session()?;
                        Ok(None)
                    }
                }
            }
        }
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthRedirect, AuthError> {
        let verifier = self
            .crypto
            .generate_pkce_verifier()
            .map_err(|e| AuthError::SignIn(e.to_string()))?;
        let challenge = pkce_challenge(&verifier);

        self.sessions.save_pending_oauth(&PendingOAuth {
            code_verifier: verifier,
            provider: provider.to_string(),
            created_at: Self::now(),
        })?;

        let mut url = Url::parse(&self.endpoint("/auth/v1/authorize"))
            .map_err(|e| AuthError::SignIn(format!("invalid project url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", &self.redirect_url)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "s256");

        info!(provider, "OAuth sign-in started");
        Ok(OAuthRedirect {
            provider: provider.to_string(),
            url: url.to_string(),
        })
    }

    async fn complete_oauth(&self, code: &str) -> Result<Identity, AuthError> {
        let pending = self
            .sessions
            .take_pending_oauth(Self::now())?
            .ok_or_else(|| AuthError::Denied("no sign-in in progress".to_string()))?;

        let session = self
            .token_grant(
                "pkce",
                &PkceGrant {
                    auth_code: code,
                    code_verifier: &pending.code_verifier,
                },
            )
            .await?;

        info!(user_id = %session.user.id, provider = %pending.provider, "OAuth sign-in completed");
        Ok(session.user.clone())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.sessions.load_session()?;
        // Local credentials go first; the remote call is best effort.
        self.sessions.clear_session()?;

        let Some(session) = session else {
            return Ok(());
        };

        let response = self
            .with_key(self.http.post(self.endpoint("/auth/v1/logout")))
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| AuthError::SignOut(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::SignOut(Self::error_message(response).await));
        }
        Ok(())
    }

    async fn list_bookmarks(&self, owner: &str) -> Result<Vec<Bookmark>, FetchError> {
        let response = self
            .send_authorized(|token: &str| {
                self.with_key(self.http.get(self.table_endpoint()))
                    .bearer_auth(token)
                    .query(&[
                        ("select", "*".to_string()),
                        ("user_id", format!("eq.{}", owner)),
                        ("order", "created_at.desc".to_string()),
                    ])
            })
            .await
            .map_err(FetchError::Network)?
            .ok_or(FetchError::NotAuthenticated)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = Self::error_message(response).await;
            return Err(FetchError::Rejected { status, message });
        }

        response
            .json::<Vec<Bookmark>>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn insert_bookmark(&self, record: &NewBookmark) -> Result<Bookmark, WriteError> {
        let response = self
            .send_authorized(|token: &str| {
                self.with_key(self.http.post(self.table_endpoint()))
                    .bearer_auth(token)
                    .header("Prefer", "return=representation")
                    .json(&[record])
            })
            .await
            .map_err(WriteError::Network)?
            .ok_or(WriteError::NotAuthenticated)?;

        if !response.status().is_success() {
            return Err(Self::write_error(response).await);
        }

        response
            .json::<Vec<Bookmark>>()
            .await
            .map_err(|e| WriteError::Decode(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| WriteError::Decode("insert returned no representation".to_string()))
    }

    async fn delete_bookmark(&self, id: &BookmarkId) -> Result<(), WriteError> {
        let response = self
            .send_authorized(|token: &str| {
                self.with_key(self.http.delete(self.table_endpoint()))
                    .bearer_auth(token)
                    .query(&[("id", format!("eq.{}", id))])
            })
            .await
            .map_err(WriteError::Network)?
            .ok_or(WriteError::NotAuthenticated)?;

        if !response.status().is_success() {
            return Err(Self::write_error(response).await);
        }
        Ok(())
    }
}
