//! Configuration module for caption-board.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the captioning
//! service, the data store and the session, `AppPaths` for the platform config
//! directory, and TOML persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, ServiceConfig, SessionConfig, StoreConfig};
