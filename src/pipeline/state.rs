//! Pipeline state machine and shared upload state.
//!
//! [`PipelineStage`] is the overall stage of the current run; [`Step`] names
//! one of the four remote operations.  [`stage_status`] derives the per-step
//! progress indicator from the two.
//!
//! [`UploadState`] is the single source of truth a UI renders from: selected
//! file, preview, stage, error message and results.  [`SharedState`] is a type
//! alias for `Arc<Mutex<UploadState>>`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::service::GeneratedCaption;

use super::file::ImageFile;
use super::media::MediaType;

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One of the four ordered remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Presign,
    Upload,
    Register,
    Generate,
}

impl Step {
    /// Fixed execution order.
    pub const ALL: [Step; 4] = [Step::Presign, Step::Upload, Step::Register, Step::Generate];

    pub fn name(&self) -> &'static str {
        match self {
            Step::Presign => "presign",
            Step::Upload => "upload",
            Step::Register => "register",
            Step::Generate => "generate",
        }
    }

    /// Label shown next to the step's progress indicator.
    pub fn label(&self) -> &'static str {
        match self {
            Step::Presign => "Generate upload URL",
            Step::Upload => "Upload image",
            Step::Register => "Register image",
            Step::Generate => "Generate captions",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// PipelineStage
// ---------------------------------------------------------------------------

/// Overall stage of the upload pipeline.
///
/// ```text
/// Idle ──run──▶ Presigning ──▶ Uploading ──▶ Registering ──▶ Generating ──▶ Done
///                    │              │              │               │
///                    └──────────────┴──────┬───────┴───────────────┘
///                                          ▼
///                                   Error { failed_at }
/// Done / Error ──reset or new file──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStage {
    #[default]
    Idle,
    Presigning,
    Uploading,
    Registering,
    Generating,
    Done,
    /// The run stopped while executing `failed_at`.
    Error { failed_at: Step },
}

impl PipelineStage {
    /// Stage entered while `step` is executing.
    pub fn running(step: Step) -> Self {
        match step {
            Step::Presign => PipelineStage::Presigning,
            Step::Upload => PipelineStage::Uploading,
            Step::Register => PipelineStage::Registering,
            Step::Generate => PipelineStage::Generating,
        }
    }

    /// The step currently executing, if a run is in flight.
    pub fn active_step(&self) -> Option<Step> {
        match self {
            PipelineStage::Presigning => Some(Step::Presign),
            PipelineStage::Uploading => Some(Step::Upload),
            PipelineStage::Registering => Some(Step::Register),
            PipelineStage::Generating => Some(Step::Generate),
            _ => None,
        }
    }

    /// Returns `true` while a run is in flight.
    ///
    /// ```
    /// use caption_board::pipeline::{PipelineStage, Step};
    ///
    /// assert!(!PipelineStage::Idle.is_running());
    /// assert!(PipelineStage::Uploading.is_running());
    /// assert!(!PipelineStage::Done.is_running());
    /// assert!(!PipelineStage::Error { failed_at: Step::Upload }.is_running());
    /// ```
    pub fn is_running(&self) -> bool {
        self.active_step().is_some()
    }

    /// `Done` and `Error` end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Error { .. })
    }

    /// Short progress line for the UI.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "",
            PipelineStage::Presigning => "Getting upload URL...",
            PipelineStage::Uploading => "Uploading image...",
            PipelineStage::Registering => "Registering image...",
            PipelineStage::Generating => "Generating captions (this may take a moment)...",
            PipelineStage::Done => "Done!",
            PipelineStage::Error { .. } => "Something went wrong.",
        }
    }
}

// ---------------------------------------------------------------------------
// StepStatus
// ---------------------------------------------------------------------------

/// Progress indicator for a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Active,
    Done,
    Error,
}

/// Derive the status of `step` from the overall `stage`.
///
/// ```
/// use caption_board::pipeline::{stage_status, PipelineStage, Step, StepStatus};
///
/// let statuses: Vec<_> = Step::ALL
///     .iter()
///     .map(|s| stage_status(*s, PipelineStage::Registering))
///     .collect();
/// assert_eq!(
///     statuses,
///     [StepStatus::Done, StepStatus::Done, StepStatus::Active, StepStatus::Pending]
/// );
/// ```
pub fn stage_status(step: Step, stage: PipelineStage) -> StepStatus {
    let pivot = match stage {
        PipelineStage::Idle => return StepStatus::Pending,
        PipelineStage::Done => return StepStatus::Done,
        PipelineStage::Error { failed_at } => failed_at,
        running => match running.active_step() {
            Some(active) => active,
            None => return StepStatus::Pending,
        },
    };

    match step.cmp(&pivot) {
        std::cmp::Ordering::Less => StepStatus::Done,
        std::cmp::Ordering::Greater => StepStatus::Pending,
        std::cmp::Ordering::Equal if matches!(stage, PipelineStage::Error { .. }) => {
            StepStatus::Error
        }
        std::cmp::Ordering::Equal => StepStatus::Active,
    }
}

// ---------------------------------------------------------------------------
// UploadState
// ---------------------------------------------------------------------------

/// Everything a UI needs to render the upload form.
#[derive(Debug, Clone, Default)]
pub struct UploadState {
    /// Currently selected file, if any.
    pub file: Option<ImageFile>,

    /// Canonical type of `file`, parsed once at selection.
    pub media: Option<MediaType>,

    /// `data:` URL preview, filled in asynchronously after selection.
    pub preview: Option<String>,

    /// Overall stage of the current run.
    pub stage: PipelineStage,

    /// Inline error: a validation message or a stage-qualified failure.
    pub error_message: Option<String>,

    /// Captions returned by the last successful run.
    pub captions: Vec<GeneratedCaption>,

    /// Bumped by every selection and reset.  An in-flight run or preview task
    /// only writes back while the epoch it started under is still current.
    pub(crate) epoch: u64,
}

impl UploadState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of every step, in execution order.
    pub fn step_statuses(&self) -> [(Step, StepStatus); 4] {
        Step::ALL.map(|step| (step, stage_status(step, self.stage)))
    }

    /// Clear everything and start a new epoch.
    pub(crate) fn clear(&mut self) {
        self.file = None;
        self.media = None;
        self.preview = None;
        self.stage = PipelineStage::Idle;
        self.error_message = None;
        self.captions.clear();
        self.epoch += 1;
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`UploadState`].
///
/// Cheap to clone (`Arc` clone).  Hold the lock for a short critical section
/// only; never across an `.await`.
pub type SharedState = Arc<Mutex<UploadState>>;

/// Construct a new [`SharedState`] wrapping an empty [`UploadState`].
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(UploadState::new()))
}

/// Lock the state, recovering the data if a previous holder panicked.
pub(crate) fn lock(state: &SharedState) -> MutexGuard<'_, UploadState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
