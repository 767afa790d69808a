//! Run driver: advances one pipeline run a single stage at a time.
//!
//! A [`PipelineRun`] carries whatever the next stage needs (the presigned
//! target, the CDN URL, the image id) in its [`RunStep`] tag.  Each call to
//! [`PipelineRun::advance`] performs exactly one remote operation and reports
//! the next stage, so the caller can publish progress between stages.
//!
//! ```text
//! Presign ──▶ Upload { target } ──▶ Register { cdn_url } ──▶ Generate { image_id } ──▶ Finished
//! ```

use std::sync::Arc;

use thiserror::Error;

use crate::service::{CaptionService, GeneratedCaption, PresignedTarget, ServiceError};
use crate::session::Session;

use super::file::ImageFile;
use super::media::MediaType;
use super::state::{PipelineStage, Step};

// ---------------------------------------------------------------------------
// StageFailure
// ---------------------------------------------------------------------------

/// A run aborted at `step`.
///
/// The message names the stage and includes the HTTP status and body when
/// the server answered, e.g. `presign failed: HTTP 500: boom`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{step} failed: {source}")]
pub struct StageFailure {
    pub step: Step,
    #[source]
    pub source: ServiceError,
}

impl StageFailure {
    pub fn status(&self) -> Option<u16> {
        self.source.status()
    }
}

// ---------------------------------------------------------------------------
// RunStep / Advance
// ---------------------------------------------------------------------------

/// What a run does next, with the data carried over from the previous stage.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStep {
    Presign,
    Upload { target: PresignedTarget },
    Register { cdn_url: String },
    Generate { image_id: String },
}

impl RunStep {
    pub fn step(&self) -> Step {
        match self {
            RunStep::Presign => Step::Presign,
            RunStep::Upload { .. } => Step::Upload,
            RunStep::Register { .. } => Step::Register,
            RunStep::Generate { .. } => Step::Generate,
        }
    }
}

/// Result of one successful [`PipelineRun::advance`].
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Moved on; the run is now in this stage.
    Continue(PipelineStage),
    /// The generate step returned; the run is over.
    Finished(Vec<GeneratedCaption>),
}

// ---------------------------------------------------------------------------
// PipelineRun
// ---------------------------------------------------------------------------

/// One run of the four-stage pipeline for a single file.
pub struct PipelineRun {
    file: ImageFile,
    media: MediaType,
    service: Arc<dyn CaptionService>,
    session: Arc<dyn Session>,
    /// Fetched during presign and reused by register and generate.
    token: Option<String>,
    next: RunStep,
}

impl PipelineRun {
    pub fn new(
        file: ImageFile,
        media: MediaType,
        service: Arc<dyn CaptionService>,
        session: Arc<dyn Session>,
    ) -> Self {
        Self {
            file,
            media,
            service,
            session,
            token: None,
            next: RunStep::Presign,
        }
    }

    /// Stage the run is in before the next [`advance`](Self::advance).
    pub fn stage(&self) -> PipelineStage {
        PipelineStage::running(self.next.step())
    }

    pub fn next_step(&self) -> &RunStep {
        &self.next
    }

    /// Perform the pending remote operation.
    ///
    /// On failure the run is left where it was; the caller records the error
    /// and drops the run.
    pub async fn advance(&mut self) -> Result<Advance, StageFailure> {
        let step = self.next.step();
        let fail = |source: ServiceError| StageFailure { step, source };
        let content_type = self.media.as_mime();

        let next = match &self.next {
            RunStep::Presign => {
                let token = self.session.bearer_token().await.map_err(|e| fail(e.into()))?;
                log::debug!("pipeline: presign for {content_type}");
                let target = self
                    .service
                    .presign(&token, content_type)
                    .await
                    .map_err(fail)?;
                self.token = Some(token);
                RunStep::Upload { target }
            }
            RunStep::Upload { target } => {
                log::debug!(
                    "pipeline: uploading {} bytes of {content_type}",
                    self.file.len()
                );
                self.service
                    .upload(target, content_type, self.file.bytes().to_vec())
                    .await
                    .map_err(fail)?;
                RunStep::Register {
                    cdn_url: target.cdn_url.clone(),
                }
            }
            RunStep::Register { cdn_url } => {
                let image_id = self
                    .service
                    .register(self.token()?, cdn_url)
                    .await
                    .map_err(fail)?;
                log::debug!("pipeline: registered image {image_id}");
                RunStep::Generate { image_id }
            }
            RunStep::Generate { image_id } => {
                let captions = self
                    .service
                    .generate(self.token()?, image_id)
                    .await
                    .map_err(fail)?;
                return Ok(Advance::Finished(captions));
            }
        };

        self.next = next;
        Ok(Advance::Continue(self.stage()))
    }

    fn token(&self) -> Result<&str, StageFailure> {
        self.token.as_deref().ok_or_else(|| StageFailure {
            step: self.next.step(),
            source: crate::session::AuthError::NotAuthenticated.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
