//! caption-board: browse AI-generated image captions, vote on them, and push
//! new images through the captioning service's upload pipeline.
//!
//! # Modules
//!
//! | module       | role                                                        |
//! |--------------|-------------------------------------------------------------|
//! | [`config`]   | `settings.toml` persistence and platform paths              |
//! | [`session`]  | current voter identity and bearer credential                |
//! | [`service`]  | captioning service HTTP client (presign/register/generate)  |
//! | [`store`]    | data store client for captions and vote records             |
//! | [`pipeline`] | upload pipeline state machine and controller                |
//! | [`vote`]     | per-caption vote toggle with optimistic rollback            |
//! | [`feed`]     | latest captions paired with their vote controllers          |

pub mod config;
pub mod feed;
pub mod pipeline;
pub mod service;
pub mod session;
pub mod store;
pub mod vote;
