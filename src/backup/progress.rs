//! Progress bars for the copy and archive phases.
//!
//! Bars draw to stderr and stay hidden when it is not a terminal, so log
//! output and tests are unaffected.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

static BYTES_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
static FILES_TEMPLATE: &str = "{msg} [{elapsed_precise}] [{bar:40}] {pos}/{len} files ({per_sec})";

/// Byte counter fed by copy workers as they finish, in completion order.
pub struct ByteProgress {
    bytes: AtomicU64,
    bar: ProgressBar,
}

impl ByteProgress {
    pub fn new(total: u64, msg: &'static str) -> Self {
        Self {
            bytes: AtomicU64::new(0),
            bar: styled_bar(total, BYTES_TEMPLATE, msg),
        }
    }

    pub fn add(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.bar.inc(bytes);
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

pub fn file_bar(total: u64, msg: &'static str) -> ProgressBar {
    styled_bar(total, FILES_TEMPLATE, msg)
}

fn styled_bar(total: u64, template: &str, msg: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(total).with_message(msg);
    match ProgressStyle::with_template(template) {
        Ok(style) => bar.set_style(style.progress_chars("=> ")),
        Err(e) => tracing::debug!("Invalid progress template: {e}"),
    }
    bar
}
