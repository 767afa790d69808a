//! Upload pipeline: local image → presign → upload → register → generate.
//!
//! # Architecture
//!
//! ```text
//! UploadController::select_file(ImageFile)
//!        │   validate MediaType, spawn preview task
//!        ▼
//! UploadController::run()
//!        │
//!        └─ PipelineRun::advance()  × 4     ← one remote call per stage
//!              ├─ Presign   (bearer)        → Uploading
//!              ├─ Upload    (no bearer)     → Registering
//!              ├─ Register  (bearer)        → Generating
//!              └─ Generate  (bearer)        → Done
//!
//! SharedState (Arc<Mutex<UploadState>>) ←── snapshot() for rendering
//! watch::Receiver<PipelineStage>        ←── subscribe() for progress
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use caption_board::config::AppConfig;
//! use caption_board::pipeline::{ImageFile, RunOutcome, UploadController};
//! use caption_board::service::HttpCaptionService;
//! use caption_board::session::StaticSession;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let controller = UploadController::new(
//!         Arc::new(HttpCaptionService::from_config(&config.service)),
//!         Arc::new(StaticSession::new(Some("me".into()), Some("token".into()))),
//!     );
//!
//!     let file = ImageFile::open("cat.png").await.unwrap();
//!     controller.select_file(file).unwrap();
//!
//!     if let RunOutcome::Done(captions) = controller.run().await {
//!         for caption in captions {
//!             println!("{}", caption.content);
//!         }
//!     }
//! }
//! ```

pub mod controller;
pub mod file;
pub mod media;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use controller::{RunOutcome, UploadController};
pub use file::{preview_data_url, ImageFile};
pub use media::{MediaType, ValidationError};
pub use runner::{Advance, PipelineRun, RunStep, StageFailure};
pub use state::{
    new_shared_state, stage_status, PipelineStage, SharedState, Step, StepStatus, UploadState,
};
