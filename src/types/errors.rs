use std::time::Duration;

use thiserror::Error;

// === AuthError ===

/// Errors from the identity side of the collaborator: session lookup, login, logout.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The session lookup request failed.
    #[error("Session lookup failed: {0}")]
    SessionLookup(String),
    /// The OAuth sign-in could not be started or completed.
    #[error("Sign-in failed: {0}")]
    SignIn(String),
    /// The provider refused the sign-in (user cancelled, bad code).
    #[error("Sign-in denied: {0}")]
    Denied(String),
    /// Session termination failed at the provider.
    #[error("Sign-out failed: {0}")]
    SignOut(String),
    /// The local session store failed.
    #[error("Session store error: {0}")]
    Store(String),
    /// The request did not complete in time.
    #[error("Auth request timed out after {0:?}")]
    Timeout(Duration),
}

// === FetchError ===

/// Errors from listing bookmarks.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No user is signed in.
    #[error("Not authenticated")]
    NotAuthenticated,
    /// The service answered with an error status.
    #[error("Bookmark listing rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The request never reached the service or the connection broke.
    #[error("Bookmark listing network error: {0}")]
    Network(String),
    /// The service answered with a body we could not decode.
    #[error("Bookmark listing decode error: {0}")]
    Decode(String),
    /// Local database operation failed.
    #[error("Bookmark database error: {0}")]
    Database(String),
    /// The request did not complete in time.
    #[error("Bookmark listing timed out after {0:?}")]
    Timeout(Duration),
}

// === WriteError ===

/// Errors from inserting or deleting bookmarks.
#[derive(Debug, Error)]
pub enum WriteError {
    /// No user is signed in.
    #[error("Not authenticated")]
    NotAuthenticated,
    /// The record to write belongs to somebody else.
    #[error("Bookmark not owned by current user: {0}")]
    NotOwner(String),
    /// The service answered with an error status.
    #[error("Bookmark write rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The request never reached the service or the connection broke.
    #[error("Bookmark write network error: {0}")]
    Network(String),
    /// The service answered with a body we could not decode.
    #[error("Bookmark write decode error: {0}")]
    Decode(String),
    /// Local database operation failed.
    #[error("Bookmark database error: {0}")]
    Database(String),
    /// The request did not complete in time.
    #[error("Bookmark write timed out after {0:?}")]
    Timeout(Duration),
}

// === StoreError ===

/// Errors from the local encrypted session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("Session database error: {0}")]
    Database(String),
    /// Failed to serialize or deserialize session data.
    #[error("Session serialization error: {0}")]
    Serialization(String),
    /// Cryptographic operation failed during session encryption/decryption.
    #[error("Session crypto error: {0}")]
    Crypto(String),
}

// === CryptoError ===

/// Errors related to cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption operation failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),
    /// Decryption operation failed.
    #[error("Decryption failed: {0}")]
    Decryption(String),
    /// Failed to generate random bytes.
    #[error("Random generation failed: {0}")]
    RandomGeneration(String),
    /// The provided key is invalid.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Store(err.to_string())
    }
}

impl From<CryptoError> for StoreError {
    fn from(err: CryptoError) -> Self {
        StoreError::Crypto(err.to_string())
    }
}
