//! Upload controller: owns the [`SharedState`] and drives runs to completion.
//!
//! ```text
//! select_file(file)
//!   └─▶ validate type ── bad ──▶ inline ValidationError, nothing stored
//!        └─▶ store file, stage = Idle, spawn preview task
//!
//! run()
//!   └─▶ Presigning ─▶ Uploading ─▶ Registering ─▶ Generating ─▶ Done
//!          any failure ─▶ Error { failed_at } + stage-qualified message
//!
//! reset()
//!   └─▶ clear everything; an in-flight run's later transitions are dropped
//! ```
//!
//! Every transition is published on a `tokio::sync::watch` channel so a UI
//! can follow progress via [`UploadController::subscribe`].

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::service::{CaptionService, GeneratedCaption};
use crate::session::Session;

use super::file::{preview_data_url, ImageFile};
use super::media::{MediaType, ValidationError};
use super::runner::{Advance, PipelineRun, StageFailure};
use super::state::{lock, new_shared_state, PipelineStage, SharedState, UploadState};

// ---------------------------------------------------------------------------
// RunOutcome
// ---------------------------------------------------------------------------

/// How a call to [`UploadController::run`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No valid file has been selected.
    NothingSelected,
    /// A run is already in flight on this controller.
    AlreadyRunning,
    /// A reset or new selection happened mid-run; results were discarded.
    Abandoned,
    /// All four stages succeeded.
    Done(Vec<GeneratedCaption>),
    /// A stage failed; the state now holds `Error { failed_at }`.
    Failed(StageFailure),
}

// ---------------------------------------------------------------------------
// UploadController
// ---------------------------------------------------------------------------

/// Drives the four-stage upload pipeline for one form.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct UploadController {
    state: SharedState,
    service: Arc<dyn CaptionService>,
    session: Arc<dyn Session>,
    stage_tx: Arc<watch::Sender<PipelineStage>>,
}

impl UploadController {
    pub fn new(service: Arc<dyn CaptionService>, session: Arc<dyn Session>) -> Self {
        let (stage_tx, _) = watch::channel(PipelineStage::Idle);
        Self {
            state: new_shared_state(),
            service,
            session,
            stage_tx: Arc::new(stage_tx),
        }
    }

    /// Receiver that sees the overall stage after every transition.
    pub fn subscribe(&self) -> watch::Receiver<PipelineStage> {
        self.stage_tx.subscribe()
    }

    /// Copy of the current observable state.
    pub fn snapshot(&self) -> UploadState {
        lock(&self.state).clone()
    }

    pub fn stage(&self) -> PipelineStage {
        lock(&self.state).stage
    }

    /// Select a file for the next run.
    ///
    /// Unsupported types are rejected inline and leave the state untouched
    /// apart from the error message.  On success the preview is derived on a
    /// background task and its handle returned; the handle may be awaited or
    /// dropped.  Outside a tokio runtime the preview is derived inline and
    /// `None` is returned.
    pub fn select_file(&self, file: ImageFile) -> Result<Option<JoinHandle<()>>, ValidationError> {
        let media = match MediaType::from_declared(file.declared_type()) {
            Ok(media) => media,
            Err(e) => {
                log::debug!("pipeline: rejected {}: {e}", file.name());
                lock(&self.state).error_message = Some(e.to_string());
                return Err(e);
            }
        };

        let epoch = {
            let mut st = lock(&self.state);
            st.clear();
            st.file = Some(file.clone());
            st.media = Some(media);
            st.epoch
        };
        self.publish(PipelineStage::Idle);
        log::info!("pipeline: selected {} ({} bytes)", file.name(), file.len());

        let state = Arc::clone(&self.state);
        let Ok(runtime) = Handle::try_current() else {
            store_preview(&state, epoch, preview_data_url(&file));
            return Ok(None);
        };
        Ok(Some(runtime.spawn(async move {
            match tokio::task::spawn_blocking(move || preview_data_url(&file)).await {
                Ok(url) => store_preview(&state, epoch, url),
                Err(e) => log::warn!("pipeline: preview task failed: {e}"),
            }
        })))
    }

    /// Run the pipeline for the selected file.
    ///
    /// No-op when nothing is selected or a run is already in flight.
    pub async fn run(&self) -> RunOutcome {
        let (mut run, epoch) = {
            let mut st = lock(&self.state);
            if st.stage.is_running() {
                return RunOutcome::AlreadyRunning;
            }
            let (Some(file), Some(media)) = (st.file.clone(), st.media) else {
                return RunOutcome::NothingSelected;
            };

            let run = PipelineRun::new(
                file,
                media,
                Arc::clone(&self.service),
                Arc::clone(&self.session),
            );
            st.stage = run.stage();
            st.error_message = None;
            st.captions.clear();
            (run, st.epoch)
        };
        self.publish(run.stage());
        log::info!("pipeline: run started");

        loop {
            let result = run.advance().await;

            let mut st = lock(&self.state);
            if st.epoch != epoch {
                log::info!("pipeline: run abandoned");
                return RunOutcome::Abandoned;
            }

            match result {
                Ok(Advance::Continue(stage)) => {
                    st.stage = stage;
                    drop(st);
                    log::debug!("pipeline: → {stage:?}");
                    self.publish(stage);
                }
                Ok(Advance::Finished(captions)) => {
                    st.stage = PipelineStage::Done;
                    st.error_message = None;
                    st.captions = captions.clone();
                    drop(st);
                    log::info!("pipeline: done, {} captions", captions.len());
                    self.publish(PipelineStage::Done);
                    return RunOutcome::Done(captions);
                }
                Err(failure) => {
                    let stage = PipelineStage::Error {
                        failed_at: failure.step,
                    };
                    st.stage = stage;
                    st.error_message = Some(failure.to_string());
                    drop(st);
                    log::error!("pipeline error: {failure}");
                    self.publish(stage);
                    return RunOutcome::Failed(failure);
                }
            }
        }
    }

    /// Clear file, preview, stage, error and results, even mid-run.
    ///
    /// Nothing is sent to the remote service; an in-flight run simply stops
    /// writing back.
    pub fn reset(&self) {
        lock(&self.state).clear();
        self.publish(PipelineStage::Idle);
        log::debug!("pipeline: reset");
    }

    fn publish(&self, stage: PipelineStage) {
        self.stage_tx.send_replace(stage);
    }
}

/// Keep `url` only if no selection or reset happened since `epoch`.
fn store_preview(state: &SharedState, epoch: u64, url: String) {
    let mut st = lock(state);
    if st.epoch == epoch {
        st.preview = Some(url);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::{stage_status, Step, StepStatus};
    use crate::service::{PresignedTarget, ServiceError};
    use crate::session::StaticSession;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Presign { token: String, content_type: String },
        Upload { url: String, content_type: String, len: usize },
        Register { token: String, image_url: String },
        Generate { token: String, image_id: String },
    }

    /// Records every call; fails at `fail_at` with a 500 if set.  When
    /// `gate_generate` is set, generate blocks until `release` is notified.
    /// `yield_each` makes every stage yield to the scheduler once.
    #[derive(Default)]
    struct MockService {
        calls: Mutex<Vec<Call>>,
        fail_at: Option<Step>,
        captions: Vec<GeneratedCaption>,
        gate_generate: bool,
        yield_each: bool,
        entered: Notify,
        release: Notify,
    }

    impl MockService {
        fn ok(captions: Vec<GeneratedCaption>) -> Self {
            Self {
                captions,
                ..Default::default()
            }
        }

        fn failing_at(step: Step) -> Self {
            Self {
                fail_at: Some(step),
                ..Default::default()
            }
        }

        fn gated() -> Self {
            Self {
                captions: vec![GeneratedCaption::new("1", "late")],
                gate_generate: true,
                ..Default::default()
            }
        }

        fn yielding(captions: Vec<GeneratedCaption>) -> Self {
            Self {
                captions,
                yield_each: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        async fn check(&self, step: Step) -> Result<(), ServiceError> {
            if self.yield_each {
                tokio::task::yield_now().await;
            }
            if self.fail_at == Some(step) {
                Err(ServiceError::Status {
                    status: 500,
                    body: "boom".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CaptionService for MockService {
        async fn presign(
            &self,
            token: &str,
            content_type: &str,
        ) -> Result<PresignedTarget, ServiceError> {
            self.calls.lock().unwrap().push(Call::Presign {
                token: token.into(),
                content_type: content_type.into(),
            });
            self.check(Step::Presign).await?;
            Ok(PresignedTarget {
                presigned_url: "https://bucket/put".into(),
                cdn_url: "https://cdn/img".into(),
            })
        }

        async fn upload(
            &self,
            target: &PresignedTarget,
            content_type: &str,
            bytes: Vec<u8>,
        ) -> Result<(), ServiceError> {
            self.calls.lock().unwrap().push(Call::Upload {
                url: target.presigned_url.clone(),
                content_type: content_type.into(),
                len: bytes.len(),
            });
            self.check(Step::Upload).await
        }

        async fn register(&self, token: &str, image_url: &str) -> Result<String, ServiceError> {
            self.calls.lock().unwrap().push(Call::Register {
                token: token.into(),
                image_url: image_url.into(),
            });
            self.check(Step::Register).await?;
            Ok("img-1".into())
        }

        async fn generate(
            &self,
            token: &str,
            image_id: &str,
        ) -> Result<Vec<GeneratedCaption>, ServiceError> {
            self.calls.lock().unwrap().push(Call::Generate {
                token: token.into(),
                image_id: image_id.into(),
            });
            if self.gate_generate {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.check(Step::Generate).await?;
            Ok(self.captions.clone())
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn signed_in() -> Arc<dyn Session> {
        Arc::new(StaticSession::new(Some("u1".into()), Some("tok".into())))
    }

    fn controller(service: Arc<MockService>) -> UploadController {
        UploadController::new(service, signed_in())
    }

    fn png() -> ImageFile {
        ImageFile::new("cat.png", "image/png", vec![1, 2, 3, 4])
    }

    fn captions() -> Vec<GeneratedCaption> {
        vec![
            GeneratedCaption::new("c1", "first"),
            GeneratedCaption::new("c2", "second"),
        ]
    }

    // -----------------------------------------------------------------------
    // select_file
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn accepted_types_select_to_idle() {
        for declared in MediaType::ACCEPTED {
            let ctl = controller(Arc::new(MockService::default()));
            ctl.select_file(ImageFile::new("f", declared, vec![0]))
                .expect("accepted")
                .expect("preview task")
                .await
                .unwrap();

            let st = ctl.snapshot();
            assert_eq!(st.stage, PipelineStage::Idle, "{declared}");
            assert!(st.error_message.is_none());
            assert!(st.file.is_some());
            assert!(st.media.is_some());
        }
    }

    #[tokio::test]
    async fn unsupported_type_stores_nothing() {
        let ctl = controller(Arc::new(MockService::default()));
        let err = ctl
            .select_file(ImageFile::new("doc.pdf", "application/pdf", vec![0]))
            .unwrap_err();

        assert!(matches!(err, ValidationError::UnsupportedType(_)));
        let st = ctl.snapshot();
        assert!(st.file.is_none());
        assert_eq!(st.stage, PipelineStage::Idle);
        assert!(st.error_message.unwrap().contains("application/pdf"));
    }

    #[tokio::test]
    async fn rejected_selection_keeps_previous_file() {
        let ctl = controller(Arc::new(MockService::default()));
        ctl.select_file(png()).unwrap();
        assert!(ctl.select_file(ImageFile::new("x.bmp", "image/bmp", vec![0])).is_err());

        assert_eq!(ctl.snapshot().file.map(|f| f.name().to_string()).as_deref(), Some("cat.png"));
    }

    /// A bad pick while generating must not leave its message on the
    /// finished run.
    #[tokio::test]
    async fn rejected_selection_during_run_does_not_outlive_it() {
        let service = Arc::new(MockService::gated());
        let ctl = controller(Arc::clone(&service));
        ctl.select_file(png()).unwrap();

        let runner = ctl.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        service.entered.notified().await;

        assert!(ctl.select_file(ImageFile::new("x.bmp", "image/bmp", vec![0])).is_err());
        assert!(ctl.snapshot().error_message.is_some());

        service.release.notify_one();
        assert!(matches!(handle.await.unwrap(), RunOutcome::Done(_)));

        let st = ctl.snapshot();
        assert_eq!(st.stage, PipelineStage::Done);
        assert!(st.error_message.is_none());
        assert_eq!(st.captions.len(), 1);
    }

    #[tokio::test]
    async fn preview_is_derived_after_selection() {
        let ctl = controller(Arc::new(MockService::default()));
        ctl.select_file(ImageFile::new("a.gif", "image/gif", b"abc".to_vec()))
            .unwrap()
            .expect("preview task")
            .await
            .unwrap();

        assert_eq!(ctl.snapshot().preview.as_deref(), Some("data:image/gif;base64,YWJj"));
    }

    #[test]
    fn select_outside_runtime_derives_preview_inline() {
        let ctl = controller(Arc::new(MockService::default()));
        let handle = ctl
            .select_file(ImageFile::new("a.gif", "image/gif", b"abc".to_vec()))
            .unwrap();

        assert!(handle.is_none());
        assert_eq!(ctl.snapshot().preview.as_deref(), Some("data:image/gif;base64,YWJj"));
    }

    #[tokio::test]
    async fn reselect_clears_previous_results() {
        let ctl = controller(Arc::new(MockService::ok(captions())));
        ctl.select_file(png()).unwrap();
        ctl.run().await;
        assert_eq!(ctl.snapshot().captions.len(), 2);

        ctl.select_file(png()).unwrap();
        let st = ctl.snapshot();
        assert!(st.captions.is_empty());
        assert_eq!(st.stage, PipelineStage::Idle);
    }

    // -----------------------------------------------------------------------
    // run
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn successful_run_ends_done_with_captions() {
        let service = Arc::new(MockService::ok(captions()));
        let ctl = controller(Arc::clone(&service));
        ctl.select_file(png()).unwrap();

        let outcome = ctl.run().await;

        assert_eq!(outcome, RunOutcome::Done(captions()));
        let st = ctl.snapshot();
        assert_eq!(st.stage, PipelineStage::Done);
        assert_eq!(st.captions, captions());
        assert!(st.error_message.is_none());

        assert_eq!(
            service.calls(),
            vec![
                Call::Presign {
                    token: "tok".into(),
                    content_type: "image/png".into()
                },
                Call::Upload {
                    url: "https://bucket/put".into(),
                    content_type: "image/png".into(),
                    len: 4
                },
                Call::Register {
                    token: "tok".into(),
                    image_url: "https://cdn/img".into()
                },
                Call::Generate {
                    token: "tok".into(),
                    image_id: "img-1".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn presign_failure_stops_before_upload() {
        let service = Arc::new(MockService::failing_at(Step::Presign));
        let ctl = controller(Arc::clone(&service));
        ctl.select_file(png()).unwrap();

        let outcome = ctl.run().await;

        assert!(matches!(outcome, RunOutcome::Failed(ref f) if f.step == Step::Presign));
        let st = ctl.snapshot();
        assert_eq!(
            st.stage,
            PipelineStage::Error {
                failed_at: Step::Presign
            }
        );
        let message = st.error_message.unwrap();
        assert!(message.contains("presign"), "{message}");
        assert!(message.contains("500"), "{message}");
        assert!(message.contains("boom"), "{message}");
        assert_eq!(service.calls().len(), 1);
    }

    #[tokio::test]
    async fn register_failure_marks_earlier_steps_done() {
        let service = Arc::new(MockService::failing_at(Step::Register));
        let ctl = controller(Arc::clone(&service));
        ctl.select_file(png()).unwrap();
        ctl.run().await;

        let st = ctl.snapshot();
        let statuses: Vec<_> = st.step_statuses().iter().map(|(_, s)| *s).collect();
        assert_eq!(
            statuses,
            [
                StepStatus::Done,
                StepStatus::Done,
                StepStatus::Error,
                StepStatus::Pending
            ]
        );
        assert!(st.captions.is_empty());
        assert!(!service
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Generate { .. })));
    }

    #[tokio::test]
    async fn jpg_alias_is_sent_as_jpeg() {
        let service = Arc::new(MockService::ok(captions()));
        let ctl = controller(Arc::clone(&service));
        ctl.select_file(ImageFile::new("p.jpg", "image/jpg", vec![9]))
            .unwrap();
        assert_eq!(ctl.snapshot().media, Some(MediaType::Jpeg));
        ctl.run().await;

        let calls = service.calls();
        assert!(matches!(
            &calls[0],
            Call::Presign { content_type, .. } if content_type == "image/jpeg"
        ));
        assert!(matches!(
            &calls[1],
            Call::Upload { content_type, .. } if content_type == "image/jpeg"
        ));
    }

    #[tokio::test]
    async fn signed_out_fails_at_presign() {
        let service = Arc::new(MockService::ok(captions()));
        let ctl = UploadController::new(
            Arc::clone(&service) as Arc<dyn CaptionService>,
            Arc::new(StaticSession::anonymous()),
        );
        ctl.select_file(png()).unwrap();

        let outcome = ctl.run().await;

        assert!(matches!(outcome, RunOutcome::Failed(ref f) if f.step == Step::Presign));
        assert!(ctl
            .snapshot()
            .error_message
            .unwrap()
            .contains("Not authenticated"));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn run_without_file_is_noop() {
        let service = Arc::new(MockService::ok(captions()));
        let ctl = controller(Arc::clone(&service));

        assert_eq!(ctl.run().await, RunOutcome::NothingSelected);
        assert_eq!(ctl.stage(), PipelineStage::Idle);
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn subscriber_sees_each_transition() {
        let ctl = controller(Arc::new(MockService::yielding(captions())));
        ctl.select_file(png()).unwrap();
        let mut rx = ctl.subscribe();

        let watcher = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let stage = *rx.borrow_and_update();
                seen.push(stage);
                if stage.is_terminal() {
                    break;
                }
            }
            seen
        });

        ctl.run().await;
        let seen = watcher.await.unwrap();
        assert_eq!(
            seen,
            [
                PipelineStage::Presigning,
                PipelineStage::Uploading,
                PipelineStage::Registering,
                PipelineStage::Generating,
                PipelineStage::Done,
            ]
        );
        assert_eq!(stage_status(Step::Generate, *ctl.subscribe().borrow()), StepStatus::Done);
    }

    #[tokio::test]
    async fn second_run_while_in_flight_is_noop() {
        let service = Arc::new(MockService::gated());
        let ctl = controller(Arc::clone(&service));
        ctl.select_file(png()).unwrap();

        let runner = ctl.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        service.entered.notified().await;

        assert_eq!(ctl.stage(), PipelineStage::Generating);
        assert_eq!(ctl.run().await, RunOutcome::AlreadyRunning);

        service.release.notify_one();
        assert!(matches!(handle.await.unwrap(), RunOutcome::Done(_)));
        assert_eq!(
            service
                .calls()
                .iter()
                .filter(|c| matches!(c, Call::Presign { .. }))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn reset_mid_run_discards_results() {
        let service = Arc::new(MockService::gated());
        let ctl = controller(Arc::clone(&service));
        ctl.select_file(png()).unwrap();

        let runner = ctl.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        service.entered.notified().await;

        ctl.reset();
        service.release.notify_one();

        assert_eq!(handle.await.unwrap(), RunOutcome::Abandoned);
        let st = ctl.snapshot();
        assert_eq!(st.stage, PipelineStage::Idle);
        assert!(st.file.is_none());
        assert!(st.captions.is_empty());
        assert!(st.error_message.is_none());
    }

    #[tokio::test]
    async fn rerun_after_error_presigns_again() {
        let service = Arc::new(MockService::failing_at(Step::Upload));
        let ctl = controller(Arc::clone(&service));
        ctl.select_file(png()).unwrap();

        ctl.run().await;
        ctl.run().await;

        let presigns = service
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Presign { .. }))
            .count();
        assert_eq!(presigns, 2);
    }
}
