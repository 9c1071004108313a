use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The authenticated principal as seen by the view-model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    /// Provider avatar (`user_metadata.avatar_url`); some providers omit it.
    pub avatar_url: Option<String>,
}

/// Tokens issued by the identity provider for one signed-in user.
///
/// Persisted encrypted by the session manager. Token bytes are wiped when the
/// value is dropped, and `Debug` never prints them.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry as UNIX seconds, when the provider reports one.
    #[zeroize(skip)]
    pub expires_at: Option<i64>,
    #[zeroize(skip)]
    pub user: Identity,
}

impl AuthSession {
    /// True when the access token is past (or within `leeway_secs` of) its expiry.
    pub fn is_expired(&self, now: i64, leeway_secs: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now + leeway_secs >= expires_at,
            None => false,
        }
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Where the UI must navigate to start the OAuth flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthRedirect {
    pub provider: String,
    pub url: String,
}

/// PKCE verifier kept between `login()` and the provider's redirect back.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PendingOAuth {
    pub code_verifier: String,
    #[zeroize(skip)]
    pub provider: String,
    #[zeroize(skip)]
    pub created_at: i64,
}

/// What the provider redirected back with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthCallback {
    Code(String),
    Denied(String),
}

impl OAuthCallback {
    /// Parses the redirect URL the provider sent the user back to.
    ///
    /// Accepts the query (`?code=...`) and the fragment (`#error=...`) forms.
    /// Returns `None` when neither a code nor an error is present.
    pub fn from_redirect_url(redirect: &str) -> Option<Self> {
        let parsed = Url::parse(redirect).ok()?;

        let mut pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if let Some(fragment) = parsed.fragment() {
            pairs.extend(
                Url::parse(&format!("http://fragment/?{}", fragment))
                    .ok()?
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned())),
            );
        }

        let lookup = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_empty())
        };

        if let Some(code) = lookup("code") {
            return Some(OAuthCallback::Code(code));
        }
        lookup("error_description")
            .or_else(|| lookup("error"))
            .map(OAuthCallback::Denied)
    }
}

/// Encrypted data container used by CryptoService.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedData {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub auth_tag: Vec<u8>,
}
