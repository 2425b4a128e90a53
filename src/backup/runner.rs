//! Sequences one backup run.
//!
//! `Idle -> LockAcquired -> Enumerating -> Copying -> Archiving -> CleaningUp
//! -> Finished`, with `Aborted` reachable from every state. Once the lock is
//! held, cleanup (staging removal, pruning, lock release) runs exactly once
//! from a drop guard, whichever phase failed and even while unwinding.

use crate::backup::archive::Archiver;
use crate::backup::backup_config::BackupConfig;
use crate::backup::copy::{CopySummary, ParallelCopier};
use crate::backup::enumerate::enumerate_files;
use crate::backup::lock::LockGuard;
use crate::backup::result_error::result::Result;
use crate::backup::retention::{cleanup_staging, prune_old_bundles};
use crate::backup::staging::StagingLayout;
use crate::backup::validate::absolute_or_same;

use chrono::{DateTime, Local};
use derive_more::Display;
use itertools::Itertools;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum RunState {
    Idle,
    LockAcquired,
    Enumerating,
    Copying,
    Archiving,
    CleaningUp,
    Finished,
    Aborted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Bundle written to disk
    Archived { bundle: PathBuf },
    /// Dry-run; the bundle that would have been written
    Simulated { bundle: PathBuf },
    /// Nothing to back up, no bundle created
    NoFiles,
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub copy: Option<CopySummary>,
    pub elapsed: Duration,
}

pub struct BackupRunner {
    config: Arc<BackupConfig>,
    dry_run: bool,
}

impl BackupRunner {
    pub fn new<C: Into<Arc<BackupConfig>>>(config: C, dry_run: bool) -> Self {
        Self {
            config: config.into(),
            dry_run,
        }
    }

    pub fn run(&self) -> Result<RunReport> {
        self.run_at(Local::now())
    }

    /// Runs with `now` as the bundle timestamp.
    pub fn run_at(&self, now: DateTime<Local>) -> Result<RunReport> {
        let start = Instant::now();
        tracing::info!("================ BACKUP STARTED ================");
        if self.dry_run {
            tracing::info!("[DRY RUN] No files will be created, modified or deleted");
        }
        enter(RunState::Idle);

        let res = self.locked_run(now);
        let elapsed = start.elapsed();
        match &res {
            Ok(_) => enter(RunState::Finished),
            Err(e) if e.is_already_running() => {
                tracing::error!("{e}");
                enter(RunState::Aborted);
            }
            Err(e) => {
                tracing::error!("CRITICAL: backup failed:\n{e}");
                enter(RunState::Aborted);
            }
        }
        tracing::info!("Total run time: {:.2} seconds", elapsed.as_secs_f64());
        tracing::info!("================ BACKUP FINISHED ================");

        res.map(|(outcome, copy)| RunReport {
            outcome,
            copy,
            elapsed,
        })
    }

    fn locked_run(&self, now: DateTime<Local>) -> Result<(RunOutcome, Option<CopySummary>)> {
        // builder-made configs skip the checks done by `BackupConfig::load`
        self.config.check()?;

        let destination = self.config.destination();
        let lock = if self.dry_run && !destination.is_dir() {
            tracing::info!(
                "[DRY RUN] Destination {:?} does not exist yet, running without lock",
                destination
            );
            None
        } else {
            std::fs::create_dir_all(destination)?;
            Some(LockGuard::acquire(self.config.lock_path())?)
        };
        enter(RunState::LockAcquired);

        let _cleanup = CleanupGuard {
            config: &self.config,
            dry_run: self.dry_run,
            lock,
        };
        self.pipeline(now)
    }

    fn pipeline(&self, now: DateTime<Local>) -> Result<(RunOutcome, Option<CopySummary>)> {
        let staging = self.config.staging_path();
        if self.dry_run {
            tracing::info!("[DRY RUN] Simulating reset of staging {:?}", staging);
        } else {
            cleanup_staging(staging, false)?;
            std::fs::create_dir_all(staging)?;
        }

        enter(RunState::Enumerating);
        let folders = self.config.source_folders().iter().map(absolute_or_same).collect_vec();
        let enumeration = enumerate_files(&folders);
        if enumeration.is_empty() {
            tracing::warn!("No files found in any source folder, nothing to back up");
            return Ok((RunOutcome::NoFiles, None));
        }

        enter(RunState::Copying);
        let layout = StagingLayout::new(staging.as_path(), &folders);
        let summary = ParallelCopier::new(layout, *self.config.parallel_workers(), self.dry_run)
            .copy_all(&enumeration)?;

        enter(RunState::Archiving);
        let output = self.config.bundle_path(&now);
        let bundle = Archiver::new(self.config.compressor(), self.dry_run)
            .create_bundle(staging, &output)?;

        let outcome = if self.dry_run {
            RunOutcome::Simulated { bundle }
        } else {
            RunOutcome::Archived { bundle }
        };
        Ok((outcome, Some(summary)))
    }
}

fn enter(state: RunState) {
    tracing::debug!("Run state: {state}");
}

/// Final phase of every run that got the lock.
struct CleanupGuard<'a> {
    config: &'a BackupConfig,
    dry_run: bool,
    lock: Option<LockGuard>,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        enter(RunState::CleaningUp);

        if let Err(e) = cleanup_staging(self.config.staging_path(), self.dry_run) {
            tracing::error!("{e}");
        }

        if self.dry_run && !self.config.destination().is_dir() {
            tracing::info!("[DRY RUN] No destination, nothing to prune");
        } else {
            match prune_old_bundles(
                self.config.destination(),
                self.config.prefix(),
                &self.config.bundle_ext(),
                *self.config.retention(),
                self.dry_run,
            ) {
                Ok(deleted) if !deleted.is_empty() => {
                    tracing::info!("Retention removed {} old bundles", deleted.len())
                }
                Ok(_) => {}
                Err(e) => tracing::error!("{e}"),
            }
        }

        // released last, after every other side effect of the run
        drop(self.lock.take());
    }
}
