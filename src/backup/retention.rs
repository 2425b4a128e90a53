use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::WithMsg;

use chrono::{DateTime, Local};
use itertools::Itertools;

use std::fs::read_dir;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A bundle file found in the destination directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Oldest first, all but the `keep` most recently modified bundles.
pub fn select_expired<I: IntoIterator<Item = BundleFile>>(bundles: I, keep: usize) -> Vec<BundleFile> {
    let sorted = bundles
        .into_iter()
        .sorted_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)))
        .collect_vec();
    let expired = sorted.len().saturating_sub(keep);
    sorted.into_iter().take(expired).collect()
}

/// Files named `<prefix>*.<ext>` directly inside `dir`.
pub fn list_bundles<P: AsRef<Path>>(dir: P, prefix: &str, ext: &str) -> Result<Vec<BundleFile>> {
    let suffix = format!(".{ext}");
    read_dir(dir.as_ref())?
        .map(|res| -> Result<Option<BundleFile>> {
            let entry = res?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                return Ok(None);
            };
            if !name.starts_with(prefix) || !name.ends_with(suffix.as_str()) {
                return Ok(None);
            }
            let md = entry.metadata()?;
            if !md.is_file() {
                return Ok(None);
            }
            Ok(Some(BundleFile {
                path: entry.path(),
                modified: md.modified()?,
            }))
        })
        .filter_map_ok(|b| b)
        .collect()
}

/// Removes the staging tree, if any. Returns whether something was (or, in
/// dry-run, would have been) removed.
pub fn cleanup_staging<P: AsRef<Path>>(staging: P, dry_run: bool) -> Result<bool> {
    let staging = staging.as_ref();
    if !staging.exists() {
        return Ok(false);
    }

    if dry_run {
        tracing::info!("[DRY RUN] Simulating removal of staging {:?}", staging);
    } else {
        tracing::info!("Removing staging {:?}", staging);
        std::fs::remove_dir_all(staging)
            .map_err(Error::from)
            .with_msg(format!("Removing staging {:?} failed", staging))?;
    }
    Ok(true)
}

/// Deletes all but the `keep` newest bundles and returns what was (or, in
/// dry-run, would have been) deleted.
///
/// Deletion carries on past individual failures; they come back together
/// as [`Error::RetentionFailure`].
pub fn prune_old_bundles<P: AsRef<Path>>(
    dir: P,
    prefix: &str,
    ext: &str,
    keep: usize,
    dry_run: bool,
) -> Result<Vec<PathBuf>> {
    tracing::info!("Checking old bundles, keeping the {} most recent", keep);
    let bundles = list_bundles(dir.as_ref(), prefix, ext)
        .map_err(|e| Error::RetentionFailure(Box::new(e)))?;

    let mut errors = Vec::new();
    let mut deleted = Vec::new();
    for bundle in select_expired(bundles, keep) {
        let modified: DateTime<Local> = bundle.modified.into();
        if dry_run {
            tracing::info!(
                "[DRY RUN] Simulating deletion of old bundle {:?} (modified {})",
                bundle.path,
                modified
            );
            deleted.push(bundle.path);
            continue;
        }

        tracing::info!("Deleting old bundle {:?} (modified {})", bundle.path, modified);
        match std::fs::remove_file(&bundle.path) {
            Ok(()) => deleted.push(bundle.path),
            Err(e) => errors.push(
                Error::from(e).with_msg(format!("Deleting {:?} failed", bundle.path)),
            ),
        }
    }

    convert_error_vec(errors).map_err(|e| Error::RetentionFailure(Box::new(e)))?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::time::Duration;
    use tempfile::TempDir;

    fn bundle(dir: &Path, name: &str, unix_time: i64) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, name).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(unix_time, 0)).unwrap();
        path
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_select_expired_keeps_newest() {
        let bundles = vec![
            BundleFile { path: "c".into(), modified: at(30) },
            BundleFile { path: "a".into(), modified: at(10) },
            BundleFile { path: "d".into(), modified: at(40) },
            BundleFile { path: "b".into(), modified: at(20) },
        ];
        let expired = select_expired(bundles, 2);
        let names = expired.iter().map(|b| b.path.clone()).collect_vec();
        assert_eq!(names, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn test_select_expired_nothing_when_within_retention() {
        let bundles = vec![
            BundleFile { path: "a".into(), modified: at(10) },
            BundleFile { path: "b".into(), modified: at(20) },
        ];
        assert!(select_expired(bundles.clone(), 2).is_empty());
        assert!(select_expired(bundles, 5).is_empty());
        assert!(select_expired(Vec::new(), 1).is_empty());
    }

    #[test]
    fn test_list_bundles_matches_prefix_and_ext() {
        let dir = TempDir::new().unwrap();
        bundle(dir.path(), "nightly_20240101_000000.tar.xz", 100);
        bundle(dir.path(), "nightly_20240102_000000.tar.xz", 200);
        bundle(dir.path(), "weekly_20240102_000000.tar.xz", 200);
        bundle(dir.path(), "nightly_notes.txt", 200);
        bundle(dir.path(), ".abc123.partial", 200);
        bundle(dir.path(), "backup.log", 200);
        std::fs::create_dir(dir.path().join("nightly_dir.tar.xz")).unwrap();

        let found = list_bundles(dir.path(), "nightly", "tar.xz").unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_prune_keeps_most_recent_by_mtime() {
        let dir = TempDir::new().unwrap();
        // names deliberately disagree with mtimes
        let oldest = bundle(dir.path(), "nightly_3.tar.xz", 1_000);
        let middle = bundle(dir.path(), "nightly_1.tar.xz", 2_000);
        let newer = bundle(dir.path(), "nightly_2.tar.xz", 3_000);
        let newest = bundle(dir.path(), "nightly_0.tar.xz", 4_000);

        let deleted = prune_old_bundles(dir.path(), "nightly", "tar.xz", 2, false).unwrap();
        assert_eq!(deleted, vec![oldest.clone(), middle.clone()]);
        assert!(!oldest.exists());
        assert!(!middle.exists());
        assert!(newer.exists());
        assert!(newest.exists());
    }

    #[test]
    fn test_prune_within_retention_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        bundle(dir.path(), "nightly_a.tar.xz", 1_000);
        bundle(dir.path(), "nightly_b.tar.xz", 2_000);

        let deleted = prune_old_bundles(dir.path(), "nightly", "tar.xz", 2, false).unwrap();
        assert!(deleted.is_empty());
        assert_eq!(list_bundles(dir.path(), "nightly", "tar.xz").unwrap().len(), 2);
    }

    #[test]
    fn test_prune_dry_run_only_reports() {
        let dir = TempDir::new().unwrap();
        let old = bundle(dir.path(), "nightly_a.tar.xz", 1_000);
        bundle(dir.path(), "nightly_b.tar.xz", 2_000);

        let deleted = prune_old_bundles(dir.path(), "nightly", "tar.xz", 1, true).unwrap();
        assert_eq!(deleted, vec![old.clone()]);
        assert!(old.exists());
    }

    #[test]
    fn test_prune_missing_dir_is_retention_failure() {
        let dir = TempDir::new().unwrap();
        let result = prune_old_bundles(dir.path().join("missing"), "nightly", "tar.xz", 1, false);
        assert!(matches!(result, Err(Error::RetentionFailure(_))));
    }

    #[test]
    fn test_cleanup_staging() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("staging");
        std::fs::create_dir_all(staging.join("a/b")).unwrap();
        std::fs::write(staging.join("a/b/f.txt"), "x").unwrap();

        assert!(cleanup_staging(&staging, true).unwrap());
        assert!(staging.exists());

        assert!(cleanup_staging(&staging, false).unwrap());
        assert!(!staging.exists());

        assert!(!cleanup_staging(&staging, false).unwrap());
    }
}
