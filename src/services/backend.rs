//! The collaborator seam: identity + persistence, as seen by the view-model.
//!
//! Implementations own the network protocol, auth scheme and storage schema.
//! Access control is theirs as well: a backend must only return and mutate
//! rows of the signed-in principal (row-level policy). The view-model trusts
//! that, and additionally drops any listed row owned by someone else.

use async_trait::async_trait;

use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark};
use crate::types::errors::{AuthError, FetchError, WriteError};
use crate::types::session::{Identity, OAuthRedirect};

/// Identity and bookmark persistence operations the view-model depends on.
#[async_trait]
pub trait BookmarkBackend: Send + Sync {
    /// Looks up an existing session. `Ok(None)` means nobody is signed in.
    async fn get_session(&self) -> Result<Option<Identity>, AuthError>;

    /// Starts the OAuth redirect flow and returns where to send the user.
    async fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthRedirect, AuthError>;

    /// Finishes the flow with the authorization code the provider redirected back with.
    async fn complete_oauth(&self, code: &str) -> Result<Identity, AuthError>;

    /// Terminates the session at the provider. Local credentials are dropped
    /// whether or not the provider call succeeds.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// All bookmarks of `owner`, newest `created_at` first.
    async fn list_bookmarks(&self, owner: &str) -> Result<Vec<Bookmark>, FetchError>;

    /// Creates a record; the service assigns `id` and `created_at`.
    async fn insert_bookmark(&self, record: &NewBookmark) -> Result<Bookmark, WriteError>;

    /// Deletes a record. Deleting an id that no longer exists succeeds.
    async fn delete_bookmark(&self, id: &BookmarkId) -> Result<(), WriteError>;
}
