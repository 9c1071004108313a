//! App Core for SmartMark.
//!
//! Central struct holding the database, settings and the bookmark view-model,
//! managing application lifecycle.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::database::connection::Database;
use crate::managers::session_manager::SessionManager;
use crate::managers::view_model::BookmarkViewModel;
use crate::platform;
use crate::services::backend::BookmarkBackend;
use crate::services::local_backend::LocalBackend;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::services::supabase_backend::SupabaseBackend;
use crate::types::errors::AuthError;
use crate::types::settings::{AppSettings, BackendKind};

pub const DATA_DIR_ENV: &str = "SMARTMARK_DATA_DIR";
pub const DATABASE_FILE: &str = "smartmark.db";
pub const SESSION_KEY_FILE: &str = "session.key";

/// Central application struct.
pub struct App {
    pub db: Arc<Database>,
    pub settings_engine: SettingsEngine,
    pub view_model: BookmarkViewModel,
    backend_kind: BackendKind,
    started: bool,
}

impl App {
    /// Data directory: `SMARTMARK_DATA_DIR` if set, else the platform data dir.
    pub fn default_data_dir() -> PathBuf {
        match std::env::var(DATA_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => platform::get_data_dir(),
        }
    }

    /// Creates the App from the platform settings file plus environment overrides.
    pub fn new(data_dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings_engine = SettingsEngine::new(None);
        settings_engine.load()?;
        settings_engine.apply_env_overrides()?;
        Self::with_settings(data_dir, settings_engine)
    }

    /// Creates the App from an already loaded settings engine.
    ///
    /// Opens `<data_dir>/smartmark.db`, reads or creates the session key next
    /// to it, and builds the collaborator selected by `backend.kind`.
    pub fn with_settings(
        data_dir: &Path,
        settings_engine: SettingsEngine,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        fs::create_dir_all(data_dir)
            .map_err(|e| format!("Failed to create data directory {}: {}", data_dir.display(), e))?;

        let db = Arc::new(Database::open(data_dir.join(DATABASE_FILE))?);
        let key = SessionManager::load_or_create_key(&data_dir.join(SESSION_KEY_FILE))?;
        let sessions = SessionManager::new(db.clone(), key)?;

        let settings = settings_engine.get_settings().clone();
        let backend = build_backend(&settings, db.clone(), sessions)?;

        info!(
            backend = ?settings.backend.kind,
            data_dir = %data_dir.display(),
            "SmartMark initialized"
        );
        Ok(Self::with_backend(db, settings_engine, backend))
    }

    /// Creates the App around an existing collaborator.
    pub fn with_backend(
        db: Arc<Database>,
        settings_engine: SettingsEngine,
        backend: Arc<dyn BookmarkBackend>,
    ) -> Self {
        let settings = settings_engine.get_settings();
        let view_model = BookmarkViewModel::new(
            backend,
            &settings.auth.provider,
            Duration::from_secs(settings.network.request_timeout_secs.max(1)),
        );
        let backend_kind = settings.backend.kind;

        Self {
            db,
            settings_engine,
            view_model,
            backend_kind,
            started: false,
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    /// Startup sequence: restore an existing session, once per App.
    pub async fn startup(&mut self) -> Result<(), AuthError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.view_model.restore_session().await
    }

    /// Shutdown sequence: tear the view-model down. The remote session stays.
    pub fn shutdown(&mut self) {
        self.view_model.teardown();
        info!("SmartMark shut down");
    }
}

/// Builds the collaborator for `settings.backend.kind`.
pub fn build_backend(
    settings: &AppSettings,
    db: Arc<Database>,
    sessions: SessionManager,
) -> Result<Arc<dyn BookmarkBackend>, Box<dyn std::error::Error>> {
    match settings.backend.kind {
        BackendKind::Local => Ok(Arc::new(LocalBackend::new(
            db,
            sessions,
            &settings.local,
            &settings.auth.redirect_url,
        ))),
        BackendKind::Supabase => {
            if settings.backend.supabase_url.trim().is_empty() {
                return Err("backend.supabase_url is not configured".into());
            }
            if settings.backend.anon_key.trim().is_empty() {
                warn!("backend.anon_key is empty, requests will likely be rejected");
            }
            Ok(Arc::new(SupabaseBackend::new(settings, sessions)?))
        }
    }
}
