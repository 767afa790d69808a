//! Application entry point: caption-board command line.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line.
//! 3. Load [`AppConfig`] from disk (returns default on first run).
//! 4. Build the session, captioning service and data store clients.
//! 5. Run the chosen subcommand on a current-thread [`tokio`] runtime.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::task::JoinError;

use caption_board::{
    config::{AppConfig, AppPaths},
    feed::load_feed,
    pipeline::{
        stage_status, ImageFile, PipelineStage, RunOutcome, Step, StepStatus, UploadController,
    },
    service::HttpCaptionService,
    session::{ConfigSession, Session},
    store::{CaptionStore, RestStore, VoteValue},
    vote::{IgnoreReason, VoteController, VoteOutcome},
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "caption-board", version, about = "Browse, vote on and generate image captions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the newest captions with your current vote.
    Feed {
        /// Number of captions to show (defaults to `store.feed_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Vote on a caption; repeating the same direction retracts the vote.
    Vote {
        caption_id: String,
        #[arg(value_enum)]
        direction: Direction,
    },
    /// Upload an image and generate captions for it.
    Upload { path: PathBuf },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Direction {
    Up,
    Down,
}

impl From<Direction> for VoteValue {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => VoteValue::Up,
            Direction::Down => VoteValue::Down,
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn vote_marker(vote: Option<VoteValue>) -> &'static str {
    match vote {
        Some(VoteValue::Up) => "+1",
        Some(VoteValue::Down) => "-1",
        None => "  ",
    }
}

async fn show_feed(config: &AppConfig, session: Arc<dyn Session>, limit: usize) -> Result<()> {
    let store = Arc::new(RestStore::from_config(&config.store, Arc::clone(&session)));
    let feed = load_feed(&*store, store.clone(), &*session, limit)
        .await
        .context("failed to load captions")?;

    if feed.is_empty() {
        println!("No captions yet.");
    }
    for item in &feed {
        let caption = &item.caption;
        println!(
            "[{}] {:>5}  {}  {}",
            vote_marker(item.vote.current_vote()),
            caption.like_count,
            caption.created_datetime_utc.format("%Y-%m-%d %H:%M"),
            caption.id
        );
        println!("          {}", caption.content);
        if let Some(url) = &caption.image_url {
            println!("          {url}");
        }
    }
    Ok(())
}

async fn cast_vote(
    config: &AppConfig,
    session: Arc<dyn Session>,
    caption_id: String,
    direction: VoteValue,
) -> Result<()> {
    let Some(voter_id) = session.voter_id() else {
        bail!("Not signed in: set session.voter_id and session.access_token in settings.toml");
    };
    let store = Arc::new(RestStore::from_config(&config.store, Arc::clone(&session)));

    let existing = store
        .votes_by(&voter_id, std::slice::from_ref(&caption_id))
        .await
        .context("failed to load current vote")?;
    let initial = existing.get(&caption_id).copied();

    let controller = VoteController::new(caption_id.clone(), Some(voter_id), initial, store);
    match controller.cast_vote(direction).await {
        VoteOutcome::Committed(vote) => {
            println!("{caption_id}: {} -> {}", vote_marker(initial), vote_marker(vote));
            Ok(())
        }
        VoteOutcome::RolledBack { error, .. } => {
            bail!("vote not saved: {error}")
        }
        VoteOutcome::Ignored(IgnoreReason::Anonymous) => bail!("Not signed in"),
        VoteOutcome::Ignored(IgnoreReason::Busy) => bail!("another vote is in progress"),
    }
}

fn print_progress(stage: PipelineStage, steps: impl IntoIterator<Item = (&'static str, StepStatus)>) {
    if !stage.label().is_empty() {
        println!("{}", stage.label());
    }
    for (label, status) in steps {
        let mark = match status {
            StepStatus::Pending => "[ ]",
            StepStatus::Active => "[~]",
            StepStatus::Done => "[x]",
            StepStatus::Error => "[!]",
        };
        println!("  {mark} {label}");
    }
}

/// Log a background task that panicked or was cancelled; `true` if it ran
/// to completion.
fn joined(task: &str, result: Result<(), JoinError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("{task} task failed: {e}");
            false
        }
    }
}

async fn upload(config: &AppConfig, session: Arc<dyn Session>, path: PathBuf) -> Result<()> {
    let file = ImageFile::open(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let controller = UploadController::new(
        Arc::new(HttpCaptionService::from_config(&config.service)),
        session,
    );
    let preview = controller.select_file(file)?;

    let mut stages = controller.subscribe();
    let printer = tokio::spawn(async move {
        while stages.changed().await.is_ok() {
            let stage = *stages.borrow_and_update();
            print_progress(stage, Step::ALL.map(|step| (step.label(), stage_status(step, stage))));
        }
    });

    let outcome = controller.run().await;
    drop(controller);
    joined("progress printer", printer.await);
    if let Some(preview) = preview {
        joined("preview", preview.await);
    }

    match outcome {
        RunOutcome::Done(captions) => {
            println!();
            for caption in captions {
                println!("- {}", caption.content);
            }
            Ok(())
        }
        RunOutcome::Failed(failure) => bail!("{failure}"),
        RunOutcome::NothingSelected => bail!("no image selected"),
        RunOutcome::AlreadyRunning => bail!("an upload is already running"),
        RunOutcome::Abandoned => bail!("upload abandoned"),
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Command line
    let cli = Cli::parse();

    // 3. Configuration
    let paths = AppPaths::new();
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 4. Session (token re-read from settings.toml on every use)
    let session: Arc<dyn Session> = Arc::new(ConfigSession::new(&paths.settings_file, &config));

    // 5. Runtime
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async {
        match cli.command {
            Command::Feed { limit } => {
                show_feed(&config, session, limit.unwrap_or(config.store.feed_limit)).await
            }
            Command::Vote {
                caption_id,
                direction,
            } => cast_vote(&config, session, caption_id, direction.into()).await,
            Command::Upload { path } => upload(&config, session, path).await,
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
