//! RPC method handler for the SmartMark JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! The `handle_method` function dispatches JSON-RPC method calls to the
//! bookmark view-model held by the `App` struct. State-changing methods
//! answer with the fresh view snapshot under `"view"`.

use tokio::sync::Mutex;

use crate::app::App;
use crate::managers::view_model::AddOutcome;
use crate::services::settings_engine::SettingsEngineTrait;
use crate::types::bookmark::BookmarkId;

use serde_json::{json, Value};

fn view_json(app: &App) -> Result<Value, String> {
    serde_json::to_value(app.view_model.snapshot()).map_err(|e| e.to_string())
}

fn add_outcome_json(app: &App, outcome: AddOutcome) -> Result<Value, String> {
    let (outcome, id) = match outcome {
        AddOutcome::Ignored => ("ignored", Value::Null),
        AddOutcome::Saved(id) => ("saved", json!(id)),
    };
    Ok(json!({"outcome": outcome, "id": id, "view": view_json(app)?}))
}

fn str_param<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str())
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &Mutex<App>, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),

        // ─── Session ───
        "session.restore" => {
            let mut a = app.lock().await;
            a.startup().await.map_err(|e| e.to_string())?;
            Ok(json!({"view": view_json(&a)?}))
        }
        "auth.login" => {
            let mut a = app.lock().await;
            let redirect = a.view_model.login().await.map_err(|e| e.to_string())?;
            Ok(json!({"provider": redirect.provider, "url": redirect.url}))
        }
        "auth.callback" => {
            let callback = str_param(params, "url")
                .or_else(|| str_param(params, "code"))
                .ok_or("missing url or code")?;
            let mut a = app.lock().await;
            let user = a.view_model.complete_login(callback).await.map_err(|e| e.to_string())?;
            Ok(json!({"user": user, "view": view_json(&a)?}))
        }
        "auth.logout" => {
            let mut a = app.lock().await;
            let remote = a.view_model.logout().await;
            Ok(json!({
                "signed_out_remotely": remote.is_ok(),
                "view": view_json(&a)?,
            }))
        }

        // ─── Bookmarks ───
        "bookmark.refresh" => {
            let mut a = app.lock().await;
            a.view_model.refresh().await.map_err(|e| e.to_string())?;
            Ok(json!({"view": view_json(&a)?}))
        }
        "bookmark.add" => {
            let title = str_param(params, "title").ok_or("missing title")?;
            let url = str_param(params, "url").ok_or("missing url")?;
            let mut a = app.lock().await;
            let outcome = a.view_model.add_bookmark(title, url).await.map_err(|e| e.to_string())?;
            add_outcome_json(&a, outcome)
        }
        "bookmark.delete" => {
            let raw = params.get("id").cloned().ok_or("missing id")?;
            let id: BookmarkId =
                serde_json::from_value(raw).map_err(|e| format!("invalid id: {}", e))?;
            let mut a = app.lock().await;
            a.view_model.delete_bookmark(&id).await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true, "view": view_json(&a)?}))
        }

        // ─── Draft & search ───
        "draft.set" => {
            let mut a = app.lock().await;
            if let Some(title) = str_param(params, "title") {
                a.view_model.set_draft_title(title);
            }
            if let Some(url) = str_param(params, "url") {
                a.view_model.set_draft_url(url);
            }
            Ok(json!({"view": view_json(&a)?}))
        }
        "draft.submit" => {
            let mut a = app.lock().await;
            let outcome = a.view_model.submit_draft().await.map_err(|e| e.to_string())?;
            add_outcome_json(&a, outcome)
        }
        "search.set" => {
            let text = str_param(params, "text").ok_or("missing text")?;
            let mut a = app.lock().await;
            a.view_model.set_search_text(text);
            Ok(json!({"view": view_json(&a)?}))
        }
        "view.get" => {
            let a = app.lock().await;
            view_json(&a)
        }

        // ─── Settings ───
        "settings.get" => {
            let a = app.lock().await;
            let mut settings = a.settings_engine.get_settings().clone();
            if !settings.backend.anon_key.is_empty() {
                settings.backend.anon_key = "***".to_string();
            }
            serde_json::to_value(settings).map_err(|e| e.to_string())
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
