//! Validation functions for configuration values.

use crate::backup::backup_config::BackupConfig;
use sanitize_filename::{is_sanitized, sanitize};
use validator::ValidationError;

use std::path::{Path, PathBuf};

pub fn validate_valid_archive_base_name<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    if name.as_ref().is_empty() {
        return Err(ValidationError::new("InvalidArchiveBaseName")
            .with_message("prefix must not be empty".into()));
    }

    if !is_sanitized(name.as_ref()) {
        return Err(ValidationError::new("InvalidArchiveBaseName").with_message(
            format!(
                "Invalid file name, try sanitizing like {:?}",
                sanitize(name)
            )
            .into(),
        ));
    }

    Ok(())
}

/// Staging is wiped recursively on every run, so it must not overlap the
/// destination, and it must not sit inside a source folder it mirrors.
pub fn validate_staging_location(config: &BackupConfig) -> Result<(), ValidationError> {
    let staging = absolute_or_same(config.staging_path());
    let destination = absolute_or_same(config.destination());

    if staging.starts_with(&destination) || destination.starts_with(&staging) {
        return Err(ValidationError::new("InvalidStagingPath").with_message(
            format!(
                "staging_path {:?} must not overlap destination {:?}",
                staging, destination
            )
            .into(),
        ));
    }

    if let Some(src) = config
        .source_folders()
        .iter()
        .map(|src| absolute_or_same(src))
        .find(|src| staging.starts_with(src) || src.starts_with(&staging))
    {
        return Err(ValidationError::new("InvalidStagingPath").with_message(
            format!(
                "staging_path {:?} must not overlap source folder {:?}",
                staging, src
            )
            .into(),
        ));
    }

    Ok(())
}

pub(crate) fn absolute_or_same<P: AsRef<Path>>(path: P) -> PathBuf {
    std::path::absolute(path.as_ref()).unwrap_or_else(|_| path.as_ref().to_path_buf())
}
