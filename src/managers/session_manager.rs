//! Session Manager for SmartMark.
//!
//! Persists the provider-issued auth session (and the PKCE verifier of a
//! login in progress) in SQLite, encrypted with AES-256-GCM via CryptoService.
//! This is what lets `restore_session()` find a signed-in user after restart.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rusqlite::params;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::database::connection::Database;
use crate::services::crypto_service::{CryptoService, CryptoServiceTrait, KEY_LENGTH};
use crate::types::errors::StoreError;
use crate::types::session::{AuthSession, EncryptedData, PendingOAuth};

/// Pending logins older than this are discarded instead of exchanged.
pub const PENDING_OAUTH_MAX_AGE_SECS: i64 = 600;

/// Trait defining session persistence operations.
pub trait SessionManagerTrait {
    fn save_session(&self, session: &AuthSession) -> Result<(), StoreError>;
    fn load_session(&self) -> Result<Option<AuthSession>, StoreError>;
    fn has_session(&self) -> bool;
    fn clear_session(&self) -> Result<(), StoreError>;
    fn save_pending_oauth(&self, pending: &PendingOAuth) -> Result<(), StoreError>;
    /// Returns and deletes the pending login, if one exists and is still fresh.
    fn take_pending_oauth(&self, now: i64) -> Result<Option<PendingOAuth>, StoreError>;
}

/// Session manager backed by SQLite + CryptoService.
pub struct SessionManager {
    db: Arc<Database>,
    crypto: CryptoService,
    encryption_key: Vec<u8>,
}

impl SessionManager {
    /// Creates a session manager that encrypts with `encryption_key` (32 bytes).
    pub fn new(db: Arc<Database>, encryption_key: Vec<u8>) -> Result<Self, StoreError> {
        if encryption_key.len() != KEY_LENGTH {
            return Err(StoreError::Crypto(format!(
                "Session key must be {} bytes, got {}",
                KEY_LENGTH,
                encryption_key.len()
            )));
        }
        Ok(Self {
            db,
            crypto: CryptoService::new(),
            encryption_key,
        })
    }

    /// Creates a session manager with a throwaway key. Sessions do not survive
    /// the process, which is what tests and in-memory databases want.
    pub fn ephemeral(db: Arc<Database>) -> Result<Self, StoreError> {
        let key = CryptoService::new().generate_key()?;
        Self::new(db, key)
    }

    /// Reads the per-install session key at `path`, creating it on first use.
    pub fn load_or_create_key(path: &Path) -> Result<Vec<u8>, StoreError> {
        if path.exists() {
            let key = fs::read(path)
                .map_err(|e| StoreError::Crypto(format!("Failed to read session key: {}", e)))?;
            if key.len() == KEY_LENGTH {
                return Ok(key);
            }
            // A truncated key cannot decrypt anything; start over.
            warn!(path = %path.display(), "session key has wrong length, regenerating");
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Crypto(format!("Failed to create key directory: {}", e)))?;
        }
        let key = CryptoService::new().generate_key()?;
        fs::write(path, &key)
            .map_err(|e| StoreError::Crypto(format!("Failed to write session key: {}", e)))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
        }
        Ok(key)
    }

    fn seal(&self, plaintext: &[u8]) -> Result<EncryptedData, StoreError> {
        Ok(self.crypto.encrypt_aes256gcm(plaintext, &self.encryption_key)?)
    }

    fn open(&self, encrypted: &EncryptedData) -> Result<Vec<u8>, StoreError> {
        Ok(self.crypto.decrypt_aes256gcm(encrypted, &self.encryption_key)?)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.encryption_key.zeroize();
    }
}

impl SessionManagerTrait for SessionManager {
    /// Serializes, encrypts and stores the session, replacing any previous one.
    fn save_session(&self, session: &AuthSession) -> Result<(), StoreError> {
        let mut json = serde_json::to_vec(session)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let encrypted = self.seal(&json);
        json.zeroize();
        let encrypted = encrypted?;

        self.db
            .connection()
            .execute(
                "INSERT OR REPLACE INTO auth_session (id, encrypted_data, iv, auth_tag, user_id, updated_at) \
                 VALUES ('default', ?1, ?2, ?3, ?4, ?5)",
                params![
                    encrypted.ciphertext,
                    encrypted.iv,
                    encrypted.auth_tag,
                    session.user.id,
                    chrono::Utc::now().timestamp()
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        debug!(user_id = %session.user.id, "auth session saved");
        Ok(())
    }

    /// Loads and decrypts the stored session.
    ///
    /// A row that no longer decrypts (key rotated, file tampered) is removed
    /// and reported as no session.
    fn load_session(&self) -> Result<Option<AuthSession>, StoreError> {
        let result = self.db.connection().query_row(
            "SELECT encrypted_data, iv, auth_tag FROM auth_session WHERE id = 'default'",
            [],
            |row| {
                Ok(EncryptedData {
                    ciphertext: row.get(0)?,
                    iv: row.get(1)?,
                    auth_tag: row.get(2)?,
                })
            },
        );

        let encrypted = match result {
            Ok(encrypted) => encrypted,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(StoreError::Database(e.to_string())),
        };

        let mut json = match self.open(&encrypted) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "stored auth session is unreadable, discarding");
                self.clear_session()?;
                return Ok(None);
            }
        };
        let session = serde_json::from_slice::<AuthSession>(&json)
            .map_err(|e| StoreError::Serialization(e.to_string()));
        json.zeroize();
        Ok(Some(session?))
    }

    fn has_session(&self) -> bool {
        self.db
            .connection()
            .query_row("SELECT COUNT(*) FROM auth_session", [], |row| row.get::<_, i64>(0))
            .map(|count| count > 0)
            .unwrap_or(false)
    }

    fn clear_session(&self) -> Result<(), StoreError> {
        self.db
            .connection()
            .execute("DELETE FROM auth_session", [])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn save_pending_oauth(&self, pending: &PendingOAuth) -> Result<(), StoreError> {
        let encrypted = self.seal(pending.code_verifier.as_bytes())?;
        self.db
            .connection()
            .execute(
                "INSERT OR REPLACE INTO oauth_state (id, provider, encrypted_verifier, iv, auth_tag, created_at) \
                 VALUES ('default', ?1, ?2, ?3, ?4, ?5)",
                params![
                    pending.provider,
                    encrypted.ciphertext,
                    encrypted.iv,
                    encrypted.auth_tag,
                    pending.created_at
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn take_pending_oauth(&self, now: i64) -> Result<Option<PendingOAuth>, StoreError> {
        let row = {
            let conn = self.db.connection();
            let result = conn.query_row(
                "SELECT provider, encrypted_verifier, iv, auth_tag, created_at FROM oauth_state WHERE id = 'default'",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        EncryptedData {
                            ciphertext: row.get(1)?,
                            iv: row.get(2)?,
                            auth_tag: row.get(3)?,
                        },
                        row.get::<_, i64>(4)?,
                    ))
                },
            );
            conn.execute("DELETE FROM oauth_state", [])
                .map_err(|e| StoreError::Database(e.to_string()))?;
            result
        };

        let (provider, encrypted, created_at) = match row {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(StoreError::Database(e.to_string())),
        };

        if now - created_at > PENDING_OAUTH_MAX_AGE_SECS {
            debug!(provider = %provider, "pending OAuth state expired");
            return Ok(None);
        }

        let mut verifier = self.open(&encrypted)?;
        let code_verifier = String::from_utf8(verifier.clone())
            .map_err(|e| StoreError::Serialization(e.to_string()));
        verifier.zeroize();

        Ok(Some(PendingOAuth {
            code_verifier: code_verifier?,
            provider,
            created_at,
        }))
    }
}
