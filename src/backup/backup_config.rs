use crate::backup::compress::CompressorConfig;
use crate::backup::file_ext::FileExtProvider;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::{validate_staging_location, validate_valid_archive_base_name};
use bon::Builder;
use chrono::{DateTime, TimeZone};
use getset::Getters;
use itertools::Itertools;
use serde::Deserialize;
use std::fmt::Display;
use std::fs::File;
use std::num::NonZero;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use validator::Validate;

pub static LOCK_FILE_NAME: &str = ".backup.lock";
pub static LOG_FILE_NAME: &str = "backup.log";
static TIME_FORMAT: &str = "%Y%m%d_%H%M%S";
static TAR_FILE_EXT: OnceLock<Arc<str>> = OnceLock::new();

/// One backup job, loaded once per run from YAML and never mutated.
#[derive(Clone, Debug, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = validate_staging_location))]
#[getset(get = "pub")]
pub struct BackupConfig {
    #[validate(length(min = 1))]
    #[builder(into)]
    source_folders: Vec<PathBuf>,
    #[builder(into)]
    destination: PathBuf,
    #[builder(into)]
    staging_path: PathBuf,
    #[validate(range(min = 1))]
    #[serde(default = "default_parallel_workers")]
    #[builder(default = default_parallel_workers())]
    parallel_workers: usize,
    /// Number of bundles kept after pruning
    #[validate(range(min = 1))]
    retention: usize,
    #[validate(custom(function = validate_valid_archive_base_name))]
    #[builder(into)]
    prefix: String,
    #[serde(default)]
    #[builder(default)]
    compressor: CompressorConfig,
}

fn default_parallel_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZero::get)
        .unwrap_or(4)
}

impl FileExtProvider for BackupConfig {
    fn file_ext(&self) -> Option<Arc<str>> {
        Some(
            std::iter::once(TAR_FILE_EXT.get_or_init(|| "tar".into()).clone())
                .chain(self.compressor.file_ext())
                .join(".")
                .into(),
        )
    }
}

impl BackupConfig {
    /// Reads and validates a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = File::open(path)
            .map_err(Error::from)
            .with_msg(format!("Open config failed: {:?}", path))
            .and_then(|f| {
                serde_yml::from_reader::<_, BackupConfig>(f)
                    .map_err(Error::from)
                    .with_msg(format!("Parse YAML config failed: {:?}", path))
            })?;

        config
            .check()
            .with_msg(format!("Config validation failed: {:?}", path))?;

        Ok(config)
    }

    /// Field rules plus the compressor settings.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .and_then(|_| self.compressor.validate())
            .map_err(Error::from)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.destination.join(LOCK_FILE_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.destination.join(LOG_FILE_NAME)
    }

    /// Extension shared by every bundle, without the leading dot.
    pub fn bundle_ext(&self) -> Arc<str> {
        self.file_ext().unwrap_or_else(|| "".into())
    }

    /// `<prefix>_<YYYYMMDD_HHMMSS>.<ext>`, sortable by its timestamp part.
    pub fn bundle_file_name<O: Display, T: TimeZone<Offset = O>>(&self, dt: &DateTime<T>) -> String {
        format!("{}_{}.{}", self.prefix, dt.format(TIME_FORMAT), self.bundle_ext())
    }

    pub fn bundle_path<O: Display, T: TimeZone<Offset = O>>(&self, dt: &DateTime<T>) -> PathBuf {
        self.destination.join(self.bundle_file_name(dt))
    }
}
