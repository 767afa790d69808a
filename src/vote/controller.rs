//! Per-caption vote toggle with optimistic update and rollback.
//!
//! | previous | new      | remote effect |
//! |----------|----------|---------------|
//! | any      | none     | delete        |
//! | none     | some     | insert        |
//! | some     | other    | update        |
//!
//! Re-selecting the direction already held toggles the vote off.  At most one
//! mutation per caption is in flight; a second `cast_vote` while `busy` is
//! ignored.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::store::{StoreError, VoteStore, VoteValue};

use super::optimistic::Tentative;

// ---------------------------------------------------------------------------
// VoteState / VoteEffect / VoteOutcome
// ---------------------------------------------------------------------------

/// Local vote state of one caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteState {
    pub current: Option<VoteValue>,
    pub busy: bool,
}

/// The single remote write a vote change maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteEffect {
    Insert(VoteValue),
    Update(VoteValue),
    Delete,
}

/// Compute the new vote and its remote effect.
///
/// ```
/// use caption_board::store::VoteValue;
/// use caption_board::vote::{plan, VoteEffect};
///
/// assert_eq!(plan(None, VoteValue::Up), (Some(VoteValue::Up), VoteEffect::Insert(VoteValue::Up)));
/// assert_eq!(plan(Some(VoteValue::Up), VoteValue::Up), (None, VoteEffect::Delete));
/// assert_eq!(
///     plan(Some(VoteValue::Up), VoteValue::Down),
///     (Some(VoteValue::Down), VoteEffect::Update(VoteValue::Down))
/// );
/// ```
pub fn plan(previous: Option<VoteValue>, direction: VoteValue) -> (Option<VoteValue>, VoteEffect) {
    match previous {
        Some(held) if held == direction => (None, VoteEffect::Delete),
        Some(_) => (Some(direction), VoteEffect::Update(direction)),
        None => (Some(direction), VoteEffect::Insert(direction)),
    }
}

/// Why a `cast_vote` call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No signed-in voter.
    Anonymous,
    /// Another vote on this caption is still in flight.
    Busy,
}

/// How a `cast_vote` call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    Ignored(IgnoreReason),
    /// The remote write succeeded; this is now the vote.
    Committed(Option<VoteValue>),
    /// The remote write failed; the vote went back to `restored`.
    RolledBack {
        restored: Option<VoteValue>,
        error: StoreError,
    },
}

// ---------------------------------------------------------------------------
// VoteController
// ---------------------------------------------------------------------------

/// Vote state and toggle logic for one caption.
///
/// Cheap to clone; clones share state.  Controllers for different captions
/// are fully independent.
#[derive(Clone)]
pub struct VoteController {
    caption_id: String,
    voter_id: Option<String>,
    state: Arc<Mutex<VoteState>>,
    store: Arc<dyn VoteStore>,
}

impl VoteController {
    /// `initial` is the voter's existing vote as loaded with the feed.
    pub fn new(
        caption_id: impl Into<String>,
        voter_id: Option<String>,
        initial: Option<VoteValue>,
        store: Arc<dyn VoteStore>,
    ) -> Self {
        Self {
            caption_id: caption_id.into(),
            voter_id,
            state: Arc::new(Mutex::new(VoteState {
                current: initial,
                busy: false,
            })),
            store,
        }
    }

    pub fn caption_id(&self) -> &str {
        &self.caption_id
    }

    pub fn state(&self) -> VoteState {
        *self.lock()
    }

    pub fn current_vote(&self) -> Option<VoteValue> {
        self.lock().current
    }

    /// Cast, switch or retract a vote in `direction`.
    ///
    /// The new vote is visible through [`state`](Self::state) before the
    /// remote call resolves.  On failure the previous vote is restored and the
    /// error logged.  `busy` is cleared either way.
    pub async fn cast_vote(&self, direction: VoteValue) -> VoteOutcome {
        let Some(voter_id) = self.voter_id.as_deref() else {
            return VoteOutcome::Ignored(IgnoreReason::Anonymous);
        };

        let (pending, effect) = {
            let mut st = self.lock();
            if st.busy {
                return VoteOutcome::Ignored(IgnoreReason::Busy);
            }
            let (next, effect) = plan(st.current, direction);
            st.busy = true;
            (Tentative::apply(&mut st.current, next), effect)
        };

        log::debug!("vote: {} {effect:?}", self.caption_id);
        let result = self.send(voter_id, effect).await;

        let mut st = self.lock();
        st.busy = false;
        match pending.settle(&mut st.current, result) {
            Ok(()) => VoteOutcome::Committed(st.current),
            Err(error) => {
                log::warn!("vote on {} failed, rolled back: {error}", self.caption_id);
                VoteOutcome::RolledBack {
                    restored: st.current,
                    error,
                }
            }
        }
    }

    async fn send(&self, voter_id: &str, effect: VoteEffect) -> Result<(), StoreError> {
        match effect {
            VoteEffect::Insert(value) => {
                self.store
                    .insert_vote(&self.caption_id, voter_id, value)
                    .await
            }
            VoteEffect::Update(value) => {
                self.store
                    .update_vote(&self.caption_id, voter_id, value)
                    .await
            }
            VoteEffect::Delete => self.store.delete_vote(&self.caption_id, voter_id).await,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VoteState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
