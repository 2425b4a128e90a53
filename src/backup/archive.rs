use crate::backup::compress::{CompressorBuilder, CompressorConfig, Finish};
use crate::backup::function_path;
use crate::backup::progress::file_bar;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};

use function_name::named;
use walkdir::WalkDir;

use std::io::{BufWriter, IntoInnerError, Write};
use std::path::{Path, PathBuf};

/// A file in staging and its name inside the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub src: PathBuf,
    pub name: PathBuf,
}

/// Full name-sorted traversal of staging; directories get no entry of their own.
pub fn collect_entries<P: AsRef<Path>>(staging: P) -> Result<Vec<ArchiveEntry>> {
    let staging = staging.as_ref();
    WalkDir::new(staging)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|res| match res {
            Ok(de) if de.file_type().is_file() => Some(
                de.path()
                    .strip_prefix(staging)
                    .map(|name| ArchiveEntry {
                        src: de.path().to_path_buf(),
                        name: name.to_path_buf(),
                    })
                    .map_err(Error::from),
            ),
            Ok(_) => None,
            Err(e) => Some(Err(e.into())),
        })
        .collect()
}

/// Packs the staging tree into a single compressed bundle.
pub struct Archiver<'a> {
    compressor: &'a CompressorConfig,
    dry_run: bool,
}

impl<'a> Archiver<'a> {
    pub fn new(compressor: &'a CompressorConfig, dry_run: bool) -> Self {
        Self {
            compressor,
            dry_run,
        }
    }

    /// Writes `output` from `staging`. Any failure is reported as
    /// [`Error::ArchiveFailure`] and leaves no file at `output`.
    pub fn create_bundle(&self, staging: &Path, output: &Path) -> Result<PathBuf> {
        if self.dry_run {
            tracing::info!("[DRY RUN] Simulating creation of bundle {:?}", output);
            return Ok(output.to_path_buf());
        }

        tracing::info!("Archiving staging {:?} to {:?}...", staging, output);
        self.write_bundle(staging, output)
            .map(|count| {
                tracing::info!("Archive complete, {} files written to {:?}", count, output);
                output.to_path_buf()
            })
            .map_err(|e| Error::ArchiveFailure {
                bundle: output.to_path_buf(),
                error: Box::new(e),
            })
    }

    #[named]
    fn write_bundle(&self, staging: &Path, output: &Path) -> Result<usize> {
        let entries = collect_entries(staging)?;
        let out_dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        // hidden name so retention never mistakes a partial bundle for a real one
        let tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".partial")
            .tempfile_in(out_dir)
            .map_err(Error::from)
            .with_msg(format!("Creating temporary bundle in {:?} failed", out_dir))?;

        let write = || -> Result<()> {
            let compressor = self.compressor.build_compressor(BufWriter::new(tmp.as_file()))?;
            let mut builder = tar::Builder::new(BufWriter::new(compressor));
            builder.follow_symlinks(true);

            let bar = file_bar(entries.len() as u64, "Archiving files");
            for entry in &entries {
                builder
                    .append_path_with_name(&entry.src, &entry.name)
                    .map_err(Error::from)
                    .with_msg(format!("Adding {:?} to bundle failed", entry.src))?;
                bar.inc(1);
            }
            bar.finish_and_clear();

            builder
                .into_inner()?
                .into_inner()
                .map_err(IntoInnerError::into_error)?
                .finish()?
                .into_inner()
                .map_err(IntoInnerError::into_error)?
                .flush()?;
            tmp.as_file().sync_all()?;
            Ok(())
        };

        write().with_debug_object_and_fn_name(staging.to_path_buf(), function_path!())?;
        tmp.persist(output).map_err(|e| Error::from(e.error))?;
        Ok(entries.len())
    }
}
