//! Data store client: captions for the feed, vote records for the voter.
//!
//! * [`CaptionStore`]: read side (latest captions, a voter's existing votes).
//! * [`VoteStore`]: write side (insert / update / delete one vote record).
//! * [`RestStore`]: PostgREST-style HTTP implementation of both.
//! * [`StoreError`]: error variants for store operations.
//!
//! Like counts are read as-is; nothing here derives them from vote rows.

pub mod model;
pub mod rest;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::AuthError;

pub use model::{Caption, VoteValue};
pub use rest::RestStore;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the data store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store answered with a non-2xx status.
    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// HTTP transport or connection error.
    #[error("store request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("store request timed out")]
    Timeout,

    /// The response body was not the expected JSON.
    #[error("failed to parse store response: {0}")]
    Parse(String),

    /// A write was attempted without a signed-in session.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StoreError::Timeout
        } else if e.is_decode() {
            StoreError::Parse(e.to_string())
        } else {
            StoreError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read access to captions and the current voter's votes.
#[async_trait]
pub trait CaptionStore: Send + Sync {
    /// Newest captions that have an image, newest first.
    async fn latest_captions(&self, limit: usize) -> Result<Vec<Caption>, StoreError>;

    /// `voter_id`'s votes on `caption_ids`, keyed by caption id.  Captions the
    /// voter has not voted on are absent from the map.
    async fn votes_by(
        &self,
        voter_id: &str,
        caption_ids: &[String],
    ) -> Result<HashMap<String, VoteValue>, StoreError>;
}

/// Write access to vote records keyed by (caption id, voter id).
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn insert_vote(
        &self,
        caption_id: &str,
        voter_id: &str,
        value: VoteValue,
    ) -> Result<(), StoreError>;

    async fn update_vote(
        &self,
        caption_id: &str,
        voter_id: &str,
        value: VoteValue,
    ) -> Result<(), StoreError>;

    async fn delete_vote(&self, caption_id: &str, voter_id: &str) -> Result<(), StoreError>;
}
