// SmartMark Settings Engine
// Manages user settings: loading, saving, updating individual values, and resetting to defaults.
// Settings are stored as a JSON file at the platform-specific config path.
// Deployment values (backend URL, anon key) can be supplied through environment variables.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::{AppSettings, BackendKind};

pub const ENV_SUPABASE_URL: &str = "SMARTMARK_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SMARTMARK_SUPABASE_ANON_KEY";
pub const ENV_BACKEND: &str = "SMARTMARK_BACKEND";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SMARTMARK_REQUEST_TIMEOUT_SECS";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<AppSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &AppSettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
    /// Overlays process environment values onto the in-memory settings. Not persisted.
    fn apply_env_overrides(&mut self) -> Result<(), SettingsError>;
}

/// Settings engine implementation that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: AppSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// If `path_override` is `Some`, uses that path for the config file.
    /// Otherwise, uses the platform-specific config directory with `settings.json`.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = match path_override {
            Some(p) => p,
            None => platform::get_config_dir()
                .join("settings.json")
                .to_string_lossy()
                .to_string(),
        };

        Self {
            config_path,
            settings: AppSettings::default(),
        }
    }

    /// Applies overrides from an arbitrary lookup. `apply_env_overrides` passes
    /// `std::env::var`; tests pass a map.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SUPABASE_URL) {
            self.settings.backend.supabase_url = url.trim().trim_end_matches('/').to_string();
            debug!(key = ENV_SUPABASE_URL, "settings override applied");
        }
        if let Some(key) = lookup(ENV_SUPABASE_ANON_KEY) {
            self.settings.backend.anon_key = key.trim().to_string();
            debug!(key = ENV_SUPABASE_ANON_KEY, "settings override applied");
        }
        if let Some(kind) = lookup(ENV_BACKEND) {
            self.settings.backend.kind = match kind.trim().to_ascii_lowercase().as_str() {
                "supabase" => BackendKind::Supabase,
                "local" => BackendKind::Local,
                other => {
                    return Err(SettingsError::InvalidValue(format!(
                        "{} must be 'supabase' or 'local', got '{}'",
                        ENV_BACKEND, other
                    )))
                }
            };
            debug!(key = ENV_BACKEND, "settings override applied");
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            let parsed: u64 = secs.trim().parse().map_err(|_| {
                SettingsError::InvalidValue(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    ENV_REQUEST_TIMEOUT_SECS, secs
                ))
            })?;
            if parsed == 0 {
                return Err(SettingsError::InvalidValue(format!(
                    "{} must be greater than zero",
                    ENV_REQUEST_TIMEOUT_SECS
                )));
            }
            self.settings.network.request_timeout_secs = parsed;
            debug!(key = ENV_REQUEST_TIMEOUT_SECS, "settings override applied");
        }
        Ok(())
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from the JSON config file.
    ///
    /// If the file does not exist, returns default settings.
    /// If the file exists but is malformed, returns a serialization error.
    fn load(&mut self) -> Result<AppSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            self.settings = AppSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let settings: AppSettings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;

        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Saves the current settings to the JSON config file.
    ///
    /// Creates parent directories if they don't exist.
    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Updates an individual setting by dot-notation key path and saves.
    ///
    /// # Examples
    /// - `"backend.supabase_url"` → updates `settings.backend.supabase_url`
    /// - `"network.request_timeout_secs"` → updates `settings.network.request_timeout_secs`
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }
        let parts: Vec<&str> = key.split('.').collect();

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        {
            let mut current = &mut json_value;
            for (i, part) in parts.iter().enumerate() {
                if i == parts.len() - 1 {
                    match current {
                        serde_json::Value::Object(map) => {
                            if !map.contains_key(*part) {
                                return Err(SettingsError::InvalidKey(format!(
                                    "Key '{}' not found in settings",
                                    key
                                )));
                            }
                            map.insert(part.to_string(), value.clone());
                        }
                        _ => {
                            return Err(SettingsError::InvalidKey(format!(
                                "Cannot navigate to key '{}': intermediate value is not an object",
                                key
                            )));
                        }
                    }
                } else {
                    current = match current.get_mut(*part) {
                        Some(v) => v,
                        None => {
                            return Err(SettingsError::InvalidKey(format!(
                                "Key '{}' not found in settings",
                                key
                            )));
                        }
                    };
                }
            }
        }

        // Round-trip through the typed struct to validate the new value.
        let new_settings: AppSettings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;

        self.settings = new_settings;
        self.save()?;

        Ok(())
    }

    /// Resets all settings to factory defaults and saves to disk.
    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = AppSettings::default();
        self.save()?;
        Ok(())
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }

    fn apply_env_overrides(&mut self) -> Result<(), SettingsError> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }
}
