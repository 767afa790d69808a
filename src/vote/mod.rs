//! Caption voting.
//!
//! ```text
//!   cast_vote(dir)
//!        |
//!        v
//!   plan(prev, dir) --> Tentative::apply --> VoteStore write --+--> commit
//!                                                             |
//!                                                             +--> rollback + warn
//! ```

pub mod controller;
pub mod optimistic;

pub use controller::{plan, IgnoreReason, VoteController, VoteEffect, VoteOutcome, VoteState};
pub use optimistic::Tentative;
