use serde::{Deserialize, Serialize};

/// Top-level application settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppSettings {
    pub backend: BackendSettings,
    pub auth: AuthSettings,
    pub network: NetworkSettings,
    pub logging: LoggingSettings,
    pub local: LocalSettings,
}

/// Which collaborator the view-model talks to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Supabase,
    Local,
}

/// Hosted backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub supabase_url: String,
    pub anon_key: String,
    pub table: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            supabase_url: String::new(),
            anon_key: String::new(),
            table: "bookmarks".to_string(),
        }
    }
}

/// OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthSettings {
    pub provider: String,
    pub redirect_url: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            redirect_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Request bounds applied to every collaborator call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkSettings {
    pub request_timeout_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
        }
    }
}

/// Log filter used when `RUST_LOG` is not set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Identity the offline collaborator signs in as.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalSettings {
    pub user_id: String,
    pub avatar_url: Option<String>,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            user_id: "local-user".to_string(),
            avatar_url: None,
        }
    }
}
