//! Session adapter: who is signed in, and their bearer credential.
//!
//! [`Session`] is the seam between the controllers and whatever auth provider
//! issued the token.  Two implementations ship here:
//!
//! * [`ConfigSession`] re-reads `settings.toml` every time a token is
//!   requested, so a token refreshed on disk is picked up by the next run.
//! * [`StaticSession`] holds fixed values.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{AppConfig, SessionConfig};

// ---------------------------------------------------------------------------
// AuthError
// ---------------------------------------------------------------------------

/// Errors raised when a bearer credential is required but unavailable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    /// There is no active session (signed out or token missing).
    #[error("Not authenticated. Please sign in again.")]
    NotAuthenticated,

    /// The session source could not be read.
    #[error("session unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Session trait
// ---------------------------------------------------------------------------

/// Source of the current voter identity and bearer credential.
///
/// Implementors must be `Send + Sync` so they can be shared behind
/// `Arc<dyn Session>`.
#[async_trait]
pub trait Session: Send + Sync {
    /// Profile id of the signed-in user, or `None` when signed out.
    fn voter_id(&self) -> Option<String>;

    /// Obtain a fresh bearer token.  Never cached by callers across runs.
    async fn bearer_token(&self) -> Result<String, AuthError>;
}

fn token_from(session: &SessionConfig) -> Result<String, AuthError> {
    match session.access_token.as_deref() {
        Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
        _ => Err(AuthError::NotAuthenticated),
    }
}

// ---------------------------------------------------------------------------
// StaticSession
// ---------------------------------------------------------------------------

/// A session with fixed identity and token.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    config: SessionConfig,
}

impl StaticSession {
    pub fn new(voter_id: Option<String>, access_token: Option<String>) -> Self {
        Self {
            config: SessionConfig {
                access_token,
                voter_id,
            },
        }
    }

    /// A signed-out session.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Session for StaticSession {
    fn voter_id(&self) -> Option<String> {
        self.config.voter_id.clone()
    }

    async fn bearer_token(&self) -> Result<String, AuthError> {
        token_from(&self.config)
    }
}

// ---------------------------------------------------------------------------
// ConfigSession
// ---------------------------------------------------------------------------

/// Session backed by the `[session]` table of a settings file.
///
/// The voter id is captured at construction; the token is re-read from disk
/// on every [`bearer_token`](Session::bearer_token) call.
#[derive(Debug, Clone)]
pub struct ConfigSession {
    path: PathBuf,
    voter_id: Option<String>,
}

impl ConfigSession {
    pub fn new(path: impl Into<PathBuf>, config: &AppConfig) -> Self {
        Self {
            path: path.into(),
            voter_id: config.session.voter_id.clone(),
        }
    }
}

#[async_trait]
impl Session for ConfigSession {
    fn voter_id(&self) -> Option<String> {
        self.voter_id.clone()
    }

    async fn bearer_token(&self) -> Result<String, AuthError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::NotAuthenticated)
            }
            Err(e) => return Err(AuthError::Unavailable(e.to_string())),
        };
        let config =
            AppConfig::parse(&content).map_err(|e| AuthError::Unavailable(e.to_string()))?;
        token_from(&config.session)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
