//! Captioning service client.
//!
//! * [`CaptionService`]: async trait, one method per pipeline stage.
//! * [`HttpCaptionService`]: `reqwest` implementation against the remote API.
//! * [`PresignedTarget`] / [`GeneratedCaption`]: wire types.
//! * [`ServiceError`]: transport, status and parse failures.

pub mod client;
pub mod types;

pub use client::{CaptionService, HttpCaptionService, ServiceError};
pub use types::{CaptionsResponse, GeneratedCaption, PresignedTarget};
