//! `settings.toml`: one table per remote collaborator plus the session.
//!
//! Every table is `#[serde(default)]`, so a file holding only `[session]` is
//! valid and the rest falls back to built-in defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Settings for the remote captioning service (presign → register → generate).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the captioning API, without a trailing slash.
    pub base_url: String,
    /// Maximum seconds to wait for any single request.  Caption generation
    /// is slow, so this is generous.
    pub timeout_secs: u64,
    /// Value sent as `isCommonUse` when registering an uploaded image.
    pub is_common_use: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.almostcrackd.ai".into(),
            timeout_secs: 120,
            is_common_use: false,
        }
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Settings for the hosted data store (captions, images, votes).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Public anon key sent as the `apikey` header on every request.
    pub anon_key: String,
    /// How many captions the feed shows.
    pub feed_limit: usize,
    /// Maximum seconds to wait for a store request.
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".into(),
            anon_key: String::new(),
            feed_limit: 20,
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Credentials of the signed-in user.  Both fields are `None` when signed out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bearer token issued by the auth provider.
    pub access_token: Option<String>,
    /// Profile id of the signed-in user; used as the voter identity.
    pub voter_id: Option<String>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use caption_board::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// println!("{}", config.service.base_url);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Captioning service settings.
    pub service: ServiceConfig,
    /// Data store settings.
    pub store: StoreConfig,
    /// Current session credentials.
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a TOML document into a config.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
