//! Where `settings.toml` lives.
//!
//! `CAPTION_BOARD_CONFIG` names the settings file directly when set.
//! Otherwise the file sits in the platform config dir from `dirs`:
//!
//! ```text
//! Linux:   ~/.config/caption-board/settings.toml
//! macOS:   ~/Library/Application Support/caption-board/settings.toml
//! Windows: %APPDATA%\caption-board\settings.toml
//! ```

use std::path::{Path, PathBuf};

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "CAPTION_BOARD_CONFIG";

const APP_DIR: &str = "caption-board";
const SETTINGS_FILE: &str = "settings.toml";

/// Resolved settings location.
#[derive(Debug, Clone, PartialEq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl AppPaths {
    /// Honour [`CONFIG_ENV`], falling back to the platform config dir (or
    /// `./caption-board` when the platform has none).
    pub fn new() -> Self {
        if let Some(file) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Self::for_file(PathBuf::from(file));
        }
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::in_dir(base.join(APP_DIR))
    }

    /// `settings.toml` inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let config_dir = dir.into();
        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            config_dir,
        }
    }

    /// An explicit settings file; its parent becomes the config dir.
    pub fn for_file(file: impl Into<PathBuf>) -> Self {
        let settings_file = file.into();
        let config_dir = settings_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            config_dir,
            settings_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
