//! # tree_backup
//!
//! One-shot full backups of directory trees into timestamped, compressed bundles.
//!
//! ## Features
//!
//! - **Multiple Sources**: any number of source folders, staged relative to their common ancestor
//! - **Parallel Copy**: bounded worker pool copying into a staging area
//! - **Compression**: tar bundles, XZ (LZMA) compressed by default
//! - **Retention Management**: keeps the N most recent bundles
//! - **Run Lock**: a marker file in the destination prevents overlapping runs
//! - **Dry Run**: full walk-through without touching any file
//!
//! ## Quick Start
//!
//! ```no_run
//! use tree_backup::backup::backup_config::BackupConfig;
//! use tree_backup::backup::runner::BackupRunner;
//!
//! let config = BackupConfig::load("config.yaml")?;
//! let report = BackupRunner::new(config, false).run()?;
//! println!("{:?}", report.outcome);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
