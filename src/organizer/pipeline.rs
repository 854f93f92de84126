//! The shuffle run: walk, classify, place.
//!
//! Discovery, classification and copies happen one file at a time on the
//! calling task. Transcodes are handed to tokio's blocking pool, gated by a
//! semaphore so that at most `max_concurrent_transcodes` encoders run at
//! once. Acquiring a permit suspends the walk until a slot frees up.
//!
//! Per file the run goes
//! `Discovered -> Classified -> {SkippedUnsupported | SkippedExists}` or
//! `Dispatched -> {Copied | Transcoded | TranscodeFailed}`; the outcome of
//! every file is collected in a [`RunSummary`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{WorkItem, copy_file, is_same_file, prepare_destination};
use crate::classifier::classify;
use crate::config::OrganizerConfig;
use crate::error::{Error, Result};
use crate::metadata::TagReader;
use crate::scanner;
use crate::transcode::{self, Encoder, TagRepair};

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The tag reader could not handle the file
    SkippedUnsupported,
    /// The destination already exists and overwrite is off
    SkippedExists(PathBuf),
    /// A destination directory component exists as a plain file
    DestinationConflict(PathBuf),
    /// Dry run: would copy to this path
    WouldCopy(PathBuf),
    /// Dry run: would transcode to this path
    WouldTranscode(PathBuf),
    Copied(PathBuf),
    CopyFailed(String),
    Transcoded { destination: PathBuf, tags: TagRepair },
    TranscodeFailed(String),
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FileOutcome::DestinationConflict(_)
                | FileOutcome::CopyFailed(_)
                | FileOutcome::TranscodeFailed(_)
        )
    }

    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            FileOutcome::SkippedUnsupported | FileOutcome::SkippedExists(_)
        )
    }
}

/// Outcome of every file seen during a run, in completion order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<(PathBuf, FileOutcome)>,
}

impl RunSummary {
    fn record(&mut self, source: PathBuf, outcome: FileOutcome) {
        self.outcomes.push((source, outcome));
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn copied(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Copied(_)))
    }

    pub fn transcoded(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Transcoded { .. }))
    }

    pub fn planned(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::WouldCopy(_) | FileOutcome::WouldTranscode(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(FileOutcome::is_skip)
    }

    pub fn failed(&self) -> usize {
        self.count(FileOutcome::is_failure)
    }

    /// Outcome recorded for `source`, if it was seen.
    pub fn outcome_of(&self, source: &Path) -> Option<&FileOutcome> {
        self.outcomes
            .iter()
            .find(|(path, _)| path == source)
            .map(|(_, outcome)| outcome)
    }
}

/// Runs one library shuffle.
pub struct Organizer<R, E> {
    config: OrganizerConfig,
    reader: R,
    encoder: Arc<E>,
}

impl<R, E> Organizer<R, E>
where
    R: TagReader,
    E: Encoder + 'static,
{
    pub fn new(config: OrganizerConfig, reader: R, encoder: E) -> Self {
        Self {
            config,
            reader,
            encoder: Arc::new(encoder),
        }
    }

    pub fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    /// Walk the library and place every file. Returns once all dispatched
    /// transcodes have finished.
    pub async fn run(&self) -> Result<RunSummary> {
        info!(
            "Rearranging {:?} into {:?}{}",
            self.config.library,
            self.config.destination,
            if self.config.dry_run { " (dry run)" } else { "" }
        );

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_transcodes));
        let mut jobs = JoinSet::new();
        // Source of every in-flight job, so a job that dies still reports its file
        let mut job_sources = HashMap::new();
        let mut summary = RunSummary::default();

        // A destination nested inside the library must not be walked
        let files = scanner::walk_excluding(&self.config.library, Some(&self.config.destination));
        for source in files {
            let item = match self.plan(&source) {
                Ok(item) => item,
                Err(outcome) => {
                    summary.record(source, outcome);
                    continue;
                }
            };

            if self.config.dry_run {
                let outcome = if item.needs_transcode {
                    info!("DRY RUN: {:?} -> TRANSCODE -> {:?}", item.source, item.destination);
                    FileOutcome::WouldTranscode(item.destination)
                } else {
                    info!("DRY RUN: {:?} -> {:?}", item.source, item.destination);
                    FileOutcome::WouldCopy(item.destination)
                };
                summary.record(source, outcome);
                continue;
            }

            if let Err(e) = prepare_destination(&self.config.destination, &item.destination) {
                warn!("Skipping {:?}: {}", source, e);
                let outcome = match e {
                    Error::DestinationConflict { path } => FileOutcome::DestinationConflict(path),
                    other => FileOutcome::CopyFailed(other.to_string()),
                };
                summary.record(source, outcome);
                continue;
            }

            if item.needs_transcode {
                let permit = permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::config(format!("transcode permit pool closed: {e}")))?;
                let encoder = Arc::clone(&self.encoder);
                let overwrite = self.config.overwrite;
                let handle = jobs.spawn_blocking(move || {
                    let _permit = permit;
                    run_transcode_job(encoder.as_ref(), &item, overwrite)
                });
                job_sources.insert(handle.id(), source);
            } else {
                let outcome = self.copy(&item);
                summary.record(source, outcome);
            }
        }

        while let Some(joined) = jobs.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    let source = job_sources.remove(&id).unwrap_or_default();
                    summary.record(source, outcome);
                }
                Err(e) => {
                    let source = job_sources.remove(&e.id()).unwrap_or_default();
                    warn!("Transcode of {:?} ended abnormally: {}", source, e);
                    summary.record(source, FileOutcome::TranscodeFailed(e.to_string()));
                }
            }
        }

        info!(
            "Done: {} copied, {} transcoded, {} skipped, {} failed",
            summary.copied(),
            summary.transcoded(),
            summary.skipped(),
            summary.failed()
        );
        Ok(summary)
    }

    /// Read, classify and resolve one file. `Err` carries the outcome of a
    /// file that goes no further.
    fn plan(&self, source: &Path) -> std::result::Result<WorkItem, FileOutcome> {
        let metadata = match self.reader.read(source) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping {:?}: {}", source, e);
                return Err(FileOutcome::SkippedUnsupported);
            }
        };

        let classification = classify(Some(&metadata));
        debug!(
            "{:?} classified as {}/{}",
            source, classification.genre, classification.level
        );

        let item = WorkItem::plan(
            source,
            &classification,
            &self.config.destination,
            self.config.transcode,
        );

        if !self.config.overwrite && item.destination.exists() {
            info!("{:?} exists, skipping", item.destination);
            return Err(FileOutcome::SkippedExists(item.destination));
        }

        Ok(item)
    }

    fn copy(&self, item: &WorkItem) -> FileOutcome {
        match copy_file(&item.source, &item.destination, self.config.overwrite) {
            Ok(true) => {
                info!(
                    "{} -> {}",
                    item.source
                        .file_name()
                        .map(|n| n.to_string_lossy())
                        .unwrap_or_default(),
                    item.destination.display()
                );
                FileOutcome::Copied(item.destination.clone())
            }
            Ok(false) => {
                warn!("File {:?} exists, skipping", item.destination);
                FileOutcome::SkippedExists(item.destination.clone())
            }
            Err(e) => {
                warn!("Copy of {:?} failed: {}", item.source, e);
                FileOutcome::CopyFailed(e.to_string())
            }
        }
    }
}

/// Body of one transcode job, run while holding a permit.
///
/// The destination is checked again here because another job may have
/// produced it since the file was planned.
fn run_transcode_job<E: Encoder + ?Sized>(
    encoder: &E,
    item: &WorkItem,
    overwrite: bool,
) -> FileOutcome {
    let exists = !overwrite && item.destination.exists();
    if exists || is_same_file(&item.source, &item.destination) {
        info!("{:?} exists, skipping", item.destination);
        return FileOutcome::SkippedExists(item.destination.clone());
    }

    match transcode::transcode(encoder, &item.source, &item.destination) {
        Ok(tags) => FileOutcome::Transcoded {
            destination: item.destination.clone(),
            tags,
        },
        Err(e) => {
            warn!("Error transcoding {:?}: {}", item.source, e);
            FileOutcome::TranscodeFailed(e.to_string())
        }
    }
}
