//! Optimistic update with rollback.
//!
//! Snapshot the prior value, apply the tentative one, attempt the remote
//! effect, then either discard the snapshot (success) or restore it (failure).
//!
//! ```
//! use caption_board::vote::Tentative;
//!
//! let mut vote = Some(1);
//! let pending = Tentative::apply(&mut vote, None);
//! assert_eq!(vote, None);
//!
//! // remote call failed
//! pending.rollback(&mut vote);
//! assert_eq!(vote, Some(1));
//! ```

/// A tentatively applied value together with the snapshot it replaced.
#[derive(Debug)]
#[must_use = "a tentative update must be committed or rolled back"]
pub struct Tentative<T> {
    previous: T,
}

impl<T> Tentative<T> {
    /// Replace `*slot` with `next`, keeping the old value as the snapshot.
    pub fn apply(slot: &mut T, next: T) -> Self {
        Self {
            previous: std::mem::replace(slot, next),
        }
    }

    /// Value that was in the slot before [`apply`](Self::apply).
    pub fn previous(&self) -> &T {
        &self.previous
    }

    /// Keep the tentative value; the snapshot is discarded.
    pub fn commit(self) {}

    /// Put the snapshot back into `slot`.
    pub fn rollback(self, slot: &mut T) {
        *slot = self.previous;
    }

    /// Commit on `Ok`, roll back on `Err`, and hand the result back.
    pub fn settle<E>(self, slot: &mut T, result: Result<(), E>) -> Result<(), E> {
        match result {
            Ok(()) => {
                self.commit();
                Ok(())
            }
            Err(e) => {
                self.rollback(slot);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_swaps_in_new_value() {
        let mut slot = 1;
        let pending = Tentative::apply(&mut slot, 2);
        assert_eq!(slot, 2);
        assert_eq!(*pending.previous(), 1);
        pending.commit();
        assert_eq!(slot, 2);
    }

    #[test]
    fn rollback_restores_snapshot() {
        let mut slot = String::from("before");
        let pending = Tentative::apply(&mut slot, String::from("after"));
        pending.rollback(&mut slot);
        assert_eq!(slot, "before");
    }

    #[test]
    fn settle_follows_result() {
        let mut slot = Some(-1);
        let pending = Tentative::apply(&mut slot, Some(1));
        assert!(pending.settle(&mut slot, Ok::<(), ()>(())).is_ok());
        assert_eq!(slot, Some(1));

        let pending = Tentative::apply(&mut slot, None);
        assert_eq!(pending.settle(&mut slot, Err("nope")), Err("nope"));
        assert_eq!(slot, Some(1));
    }
}
