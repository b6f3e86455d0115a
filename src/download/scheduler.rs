//! Bounded-concurrency batch downloader
//!
//! One tokio task is spawned per track. Each task takes a permit from a
//! semaphore sized to the parallel limit before touching the network, and
//! the permit is dropped on every exit path. The batch returns once every
//! task has finished.

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{QualityTier, TrackError};
use super::stream::StreamDecoder;
use super::task::{DownloadTask, Outcome, TaskContext, TaskOutcome};
use crate::catalog::{Catalog, Track};
use crate::config::DownloadConfig;
use crate::storage::LibraryLayout;

/// Per-track results of a batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<TaskOutcome>,
    /// Most tasks that held an admission slot at the same time
    pub peak_in_flight: usize,
}

impl BatchReport {
    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::AlreadyPresent { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| !o.is_success())
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|t| pred(&t.outcome)).count()
    }
}

/// Counts a task as in flight until dropped
struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Drives one download task per track under a fixed admission limit
pub struct Scheduler {
    ctx: Arc<TaskContext>,
    quality: QualityTier,
    parallel: usize,
}

impl Scheduler {
    /// Create a scheduler with its own HTTP client
    pub fn new(
        catalog: Arc<dyn Catalog>,
        decoder: Arc<dyn StreamDecoder>,
        config: &DownloadConfig,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("tunegrab/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(catalog, decoder, http, config))
    }

    pub fn with_client(
        catalog: Arc<dyn Catalog>,
        decoder: Arc<dyn StreamDecoder>,
        http: Client,
        config: &DownloadConfig,
    ) -> Self {
        let ctx = TaskContext {
            catalog,
            decoder,
            http,
            layout: LibraryLayout::new(config.output_dir.clone()),
            art_size: config.art_size,
            cover_file: config.cover_file,
        };

        Self {
            ctx: Arc::new(ctx),
            quality: config.quality,
            parallel: config.parallel.max(1),
        }
    }

    /// Download every track; never fails as a whole
    pub async fn run(&self, tracks: Vec<Track>, progress: &ProgressBar) -> BatchReport {
        let total = tracks.len();
        progress.set_length(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            progress.set_style(style.progress_chars("#>-"));
        }
        info!("Downloading {} tracks, {} at a time", total, self.parallel);

        let gate = Arc::new(Semaphore::new(self.parallel));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(total);

        for track in tracks {
            let task = DownloadTask::new(track, self.quality);
            let ident = (task.track.id.clone(), task.track.title.clone());
            let ctx = self.ctx.clone();
            let gate = gate.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            let progress = progress.clone();

            let handle = tokio::spawn(async move {
                let outcome = match gate.acquire_owned().await {
                    Ok(_permit) => {
                        let _slot = InFlight::enter(&in_flight, &peak);
                        task.run(&ctx).await
                    }
                    Err(e) => task.finish(Outcome::Failed(TrackError::Aborted(e.to_string()))),
                };
                report(&progress, &outcome);
                outcome
            });

            handles.push((ident, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for ((track_id, title), handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!("Download task for {} panicked: {}", title, e);
                    outcomes.push(TaskOutcome {
                        track_id,
                        title,
                        outcome: Outcome::Failed(TrackError::Aborted(e.to_string())),
                    });
                }
            }
        }

        progress.finish_with_message("Downloads complete");

        let report = BatchReport {
            outcomes,
            peak_in_flight: peak.load(Ordering::SeqCst),
        };
        info!(
            "Batch finished: {} downloaded, {} already present, {} failed",
            report.downloaded(),
            report.skipped(),
            report.failed()
        );
        report
    }
}

fn report(progress: &ProgressBar, outcome: &TaskOutcome) {
    progress.inc(1);
    match &outcome.outcome {
        Outcome::Downloaded { path, tier } => {
            debug!("Downloaded {} at {}", outcome.title, tier);
            progress.set_message(outcome.title.clone());
            progress.println(format!("{} {}", "downloaded".green(), path.display()));
        }
        Outcome::AlreadyPresent { path } => {
            progress.println(format!("{} {}", "exists".yellow(), path.display()));
        }
        Outcome::Failed(e) => {
            warn!("Failed to download {} ({}): {}", outcome.title, outcome.track_id, e);
            progress.println(format!("{} {}: {}", "failed".red(), outcome.title, e));
        }
    }
}
