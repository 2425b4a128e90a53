use crate::backup::enumerate::{Enumeration, FileTask};
use crate::backup::function_path;
use crate::backup::progress::ByteProgress;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use crate::backup::staging::StagingLayout;

use filetime::FileTime;
use function_name::named;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use std::path::Path;
use std::sync::Arc;

/// Outcome of copying one file into staging.
#[derive(Debug)]
pub struct CopyResult {
    pub src: Arc<Path>,
    pub outcome: Result<u64>,
}

impl CopyResult {
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Bytes copied, 0 on failure
    pub fn bytes(&self) -> u64 {
        *self.outcome.as_ref().unwrap_or(&0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub files_total: usize,
    pub files_copied: usize,
    pub files_failed: usize,
    pub bytes_expected: u64,
    pub bytes_copied: u64,
}

/// Copies enumerated files into staging on a fixed-size worker pool.
pub struct ParallelCopier {
    layout: StagingLayout,
    workers: usize,
    dry_run: bool,
}

impl ParallelCopier {
    pub fn new(layout: StagingLayout, workers: usize, dry_run: bool) -> Self {
        Self {
            layout,
            workers: workers.max(1),
            dry_run,
        }
    }

    /// Returns once every task has finished; single file failures are
    /// logged and counted, never propagated.
    pub fn copy_all(&self, enumeration: &Enumeration) -> Result<CopySummary> {
        tracing::info!(
            "Copying {} files ({}) to staging {:?} with {} workers...",
            enumeration.tasks.len(),
            indicatif::HumanBytes(enumeration.total_bytes),
            self.layout.staging(),
            self.workers
        );
        if self.dry_run {
            tracing::info!("[DRY RUN] Simulating file copy, staging is left untouched");
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("copy-worker-{i}"))
            .build()?;
        let progress = ByteProgress::new(enumeration.total_bytes, "Copying files");

        let files_failed = pool.install(|| {
            enumeration
                .tasks
                .par_iter()
                .map(|task| self.copy_task(task))
                .filter(|result| {
                    if result.success() {
                        progress.add(result.bytes());
                    }
                    !result.success()
                })
                .count()
        });
        progress.finish();

        let summary = CopySummary {
            files_total: enumeration.tasks.len(),
            files_copied: enumeration.tasks.len() - files_failed,
            files_failed,
            bytes_expected: enumeration.total_bytes,
            bytes_copied: progress.bytes(),
        };

        if summary.files_failed > 0 {
            tracing::warn!(
                "Copied {} of {} files ({}), {} failed and are left out of the bundle",
                summary.files_copied,
                summary.files_total,
                indicatif::HumanBytes(summary.bytes_copied),
                summary.files_failed
            );
        } else {
            tracing::info!(
                "Copied {} files ({})",
                summary.files_copied,
                indicatif::HumanBytes(summary.bytes_copied)
            );
        }
        Ok(summary)
    }

    fn copy_task(&self, task: &FileTask) -> CopyResult {
        let outcome = self.copy_file(task).map_err(|e| {
            let e = Error::CopyFailure {
                src: task.src.to_path_buf(),
                error: Box::new(e),
            };
            tracing::error!("{e}");
            e
        });

        CopyResult {
            src: task.src.clone(),
            outcome,
        }
    }

    #[named]
    fn copy_file(&self, task: &FileTask) -> Result<u64> {
        let copy = || -> Result<u64> {
            let md = std::fs::metadata(&task.src)?;
            let dst = self.layout.destination(task)?;

            if self.dry_run {
                tracing::trace!("[DRY RUN] Would copy {:?} -> {:?}", task.src, dst);
                return Ok(md.len());
            }

            if let Some(parent) = dst.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let copied = std::fs::copy(&task.src, &dst)?;
            filetime::set_file_times(
                &dst,
                FileTime::from_last_access_time(&md),
                FileTime::from_last_modification_time(&md),
            )?;
            tracing::trace!("Copied {:?} -> {:?}", task.src, dst);
            Ok(copied)
        };

        copy().with_debug_object_and_fn_name(task.src.to_path_buf(), function_path!())
    }
}
