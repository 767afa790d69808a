//! Caption feed: latest captions, each paired with its vote controller.

use std::collections::HashMap;
use std::sync::Arc;

use crate::session::Session;
use crate::store::{Caption, CaptionStore, StoreError, VoteStore};
use crate::vote::VoteController;

/// One feed entry.
#[derive(Clone)]
pub struct FeedItem {
    pub caption: Caption,
    pub vote: VoteController,
}

/// Load the newest `limit` captions and seed a [`VoteController`] for each
/// with the voter's existing vote.
///
/// A failed vote lookup is logged and treated as "no votes yet"; a failed
/// caption fetch is returned as an error.
pub async fn load_feed(
    captions: &dyn CaptionStore,
    votes: Arc<dyn VoteStore>,
    session: &dyn Session,
    limit: usize,
) -> Result<Vec<FeedItem>, StoreError> {
    let latest = captions.latest_captions(limit).await?;
    let voter_id = session.voter_id();

    let existing = match voter_id.as_deref() {
        Some(voter) => {
            let ids: Vec<String> = latest.iter().map(|c| c.id.clone()).collect();
            captions.votes_by(voter, &ids).await.unwrap_or_else(|e| {
                log::warn!("could not load existing votes: {e}");
                HashMap::new()
            })
        }
        None => HashMap::new(),
    };

    log::debug!("feed: {} captions, {} existing votes", latest.len(), existing.len());

    Ok(latest
        .into_iter()
        .map(|caption| {
            let initial = existing.get(&caption.id).copied();
            let vote = VoteController::new(
                caption.id.clone(),
                voter_id.clone(),
                initial,
                Arc::clone(&votes),
            );
            FeedItem { caption, vote }
        })
        .collect())
}
