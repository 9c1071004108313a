// SmartMark platform paths for Windows
// Config and data: %APPDATA%/SmartMark

use std::env;
use std::path::PathBuf;

fn roaming_dir() -> PathBuf {
    PathBuf::from(
        env::var("APPDATA").unwrap_or_else(|_| String::from("C:\\Users\\Default\\AppData\\Roaming")),
    )
}

/// `%APPDATA%/SmartMark`
pub fn get_config_dir() -> PathBuf {
    roaming_dir().join("SmartMark")
}

/// Same directory as the config.
pub fn get_data_dir() -> PathBuf {
    get_config_dir()
}
