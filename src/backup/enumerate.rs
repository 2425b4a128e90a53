use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;

use dyn_iter::{DynIter, IntoDynIterator};
use itertools::Itertools;
use walkdir::{DirEntry, WalkDir};

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A regular file found under one of the source folders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileTask {
    /// Path of the file itself
    pub src: Arc<Path>,
    /// Source folder the file was found under
    pub root: Arc<Path>,
    /// Size at enumeration time
    pub size: u64,
}

/// All files of one run, materialized once.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub tasks: Vec<FileTask>,
    pub total_bytes: u64,
    /// Folders and entries that were skipped with a warning
    pub skipped: usize,
}

impl Enumeration {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Lazily walks every source folder in order.
///
/// Folders that are missing or not directories yield a single
/// [`Error::SourceMissing`] item instead of failing the walk.
pub fn file_task_iterator<'a>(folders: &'a [PathBuf]) -> DynIter<'a, Result<FileTask>> {
    folders
        .iter()
        .flat_map(|folder| -> DynIter<'a, Result<FileTask>> {
            if !folder.is_dir() {
                return std::iter::once(Err(Error::SourceMissing(folder.clone()))).into_dyn_iter();
            }

            tracing::info!("Scanning source folder {:?}", folder);
            let root: Arc<Path> = folder.as_path().into();
            WalkDir::new(folder)
                .into_iter()
                .filter_map(move |res| match res {
                    Ok(de) => process_dir_entry(de, &root),
                    Err(e) => Some(Err(e.into())),
                })
                .into_dyn_iter()
        })
        .into_dyn_iter()
}

fn process_dir_entry(de: DirEntry, root: &Arc<Path>) -> Option<Result<FileTask>> {
    let file_type = de.file_type();
    let md = if file_type.is_file() {
        de.metadata().map_err(Error::from)
    } else if file_type.is_symlink() {
        // linked files are copied through the link, linked directories are not entered
        match std::fs::metadata(de.path()) {
            Ok(md) if md.is_file() => Ok(md),
            Ok(_) => {
                tracing::trace!("Skipping {:?} link to a non-file", de.path());
                return None;
            }
            Err(e) => Err(Error::from(e)),
        }
    } else {
        tracing::trace!("Skipping {:?} not a file", de.path());
        return None;
    };

    Some(
        md.with_msg(format!("Reading metadata of {:?} failed", de.path()))
            .map(|md| FileTask {
                src: de.into_path().into(),
                root: root.clone(),
                size: md.len(),
            }),
    )
}

/// Materializes [`file_task_iterator`], logging and skipping every failure.
///
/// A file reachable from two configured folders is kept once, under the
/// first folder that reached it.
pub fn enumerate_files(folders: &[PathBuf]) -> Enumeration {
    let mut skipped = 0;
    let tasks = file_task_iterator(folders)
        .filter_map(|res| match res {
            Ok(task) => Some(task),
            Err(e) => {
                tracing::warn!("{e}");
                skipped += 1;
                None
            }
        })
        .unique_by(|task| task.src.clone())
        .collect_vec();

    let total_bytes = tasks.iter().map(|t| t.size).sum();
    tracing::info!(
        "Found {} files ({}) in {} source folders",
        tasks.len(),
        indicatif::HumanBytes(total_bytes),
        folders.len()
    );

    Enumeration {
        tasks,
        total_bytes,
        skipped,
    }
}
