use std::path::PathBuf;

use crate::error::{Result, XcError};

const APP_DIR: &str = "xc-dl";
const KEY_FILENAME: &str = "api_key.txt";

/// Environment variables checked for a key, in order.
pub const KEY_ENV_VARS: &[&str] = &["XC_API_KEY", "XENO_CANTO_API_KEY"];

/// Resolve the per-user config directory.
///
/// On Windows: `%APPDATA%\xc-dl\`
/// On macOS:   `~/Library/Application Support/xc-dl/`
/// On Linux:   `$XDG_CONFIG_HOME/xc-dl/` or `~/.config/xc-dl/`
fn app_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(|d| PathBuf::from(d).join(APP_DIR))
    }
    #[cfg(target_os = "macos")]
    {
        home_dir().map(|h| h.join("Library/Application Support").join(APP_DIR))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|h| h.join(".config")))
            .map(|d| d.join(APP_DIR))
    }
}

#[cfg(not(target_os = "windows"))]
fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// Path of the stored API key file.
pub fn key_path() -> Option<PathBuf> {
    app_config_dir().map(|d| d.join(KEY_FILENAME))
}

/// Read the stored API key, if any.
pub fn load_key() -> Option<String> {
    let key = std::fs::read_to_string(key_path()?).ok()?;
    let key = key.trim().to_string();
    if key.is_empty() { None } else { Some(key) }
}

/// Save an API key to the config location.
pub fn save_key(key: &str) -> Result<PathBuf> {
    let key = key.trim();
    if key.is_empty() {
        return Err(XcError::Authentication("refusing to store an empty API key".into()));
    }
    let path = key_path().ok_or_else(|| XcError::config("could not determine config directory"))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| XcError::io(parent, e))?;
    }
    std::fs::write(&path, key).map_err(|e| XcError::io(&path, e))?;
    Ok(path)
}

/// Remove the stored API key. Returns whether a file was removed.
pub fn delete_key() -> Result<bool> {
    match key_path() {
        Some(path) if path.exists() => {
            std::fs::remove_file(&path).map_err(|e| XcError::io(&path, e))?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Resolve an API key from (in priority order):
/// 1. Explicit `--key` argument
/// 2. Stored key file
/// 3. `XC_API_KEY`, then `XENO_CANTO_API_KEY`
///    (a `.env` file is loaded into the environment by the CLI)
pub fn resolve_key(explicit: Option<&str>) -> Option<String> {
    if let Some(k) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(k.to_string());
    }
    if let Some(k) = load_key() {
        return Some(k);
    }
    KEY_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|k| k.trim().to_string())
        .find(|k| !k.is_empty())
}
