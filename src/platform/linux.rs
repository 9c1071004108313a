// SmartMark platform paths for Linux
// Config: ~/.config/smartmark
// Data:   ~/.local/share/smartmark

use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "smartmark";

/// Resolves `$<xdg_var>/smartmark`, falling back to `$HOME/<fallback>/smartmark`.
fn xdg_dir(xdg: Option<String>, home: Option<String>, fallback: &[&str]) -> PathBuf {
    match xdg.filter(|v| !v.is_empty()) {
        Some(base) => PathBuf::from(base).join(APP_DIR),
        None => {
            let mut path = PathBuf::from(home.unwrap_or_else(|| String::from("/tmp")));
            for part in fallback {
                path.push(part);
            }
            path.join(APP_DIR)
        }
    }
}

pub fn get_config_dir() -> PathBuf {
    xdg_dir(env::var("XDG_CONFIG_HOME").ok(), env::var("HOME").ok(), &[".config"])
}

pub fn get_data_dir() -> PathBuf {
    xdg_dir(env::var("XDG_DATA_HOME").ok(), env::var("HOME").ok(), &[".local", "share"])
}
