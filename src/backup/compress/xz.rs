use crate::backup::compress::{Compressor, CompressorBuilder};
use crate::backup::result_error::result::Result;
use liblzma::stream::{Check, MtStreamBuilder};
use liblzma::write::XzEncoder;
use serde::Deserialize;
use std::io::Write;
use std::num::NonZero;
use validator::Validate;

static DEFAULT_COMPRESSION_LEVEL: u32 = 6;
static DEFAULT_MAX_PARALLELIZATION: usize = 16;

/// XZ (LZMA) settings for bundle compression
#[derive(Clone, Default, Validate, Deserialize, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct XzConfig {
    /// Preset 0 (fastest) to 9 (smallest)
    #[validate(range(min = 0, max = 9))]
    level: Option<u32>,

    /// Encoder threads; half the cores when unset
    #[validate(range(min = 1))]
    thread: Option<u32>,
}

impl XzConfig {
    fn thread_count(&self) -> u32 {
        self.thread.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZero::get)
                .map(|core| (core / 2).clamp(1, DEFAULT_MAX_PARALLELIZATION) as u32)
                .unwrap_or(1)
        })
    }
}

impl<W: Write> CompressorBuilder<W> for XzConfig {
    fn build_compressor(&self, writer: W) -> Result<Compressor<W>> {
        let level = self.level.unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        let thread = self.thread_count();

        tracing::debug!("Creating XZ compressor with level={}, threads={}", level, thread);

        if thread == 1 {
            Ok(XzEncoder::new(writer, level).into())
        } else {
            let stream = MtStreamBuilder::new()
                .preset(level)
                .check(Check::Crc64)
                .threads(thread)
                .encoder()?;
            Ok(XzEncoder::new_stream(writer, stream).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_xz_config_validation() {
        let valid = XzConfig {
            level: Some(9),
            thread: Some(2),
        };
        assert!(valid.validate().is_ok());

        let bad_level = XzConfig {
            level: Some(10),
            thread: None,
        };
        assert!(bad_level.validate().is_err());

        let bad_thread = XzConfig {
            level: None,
            thread: Some(0),
        };
        assert!(bad_thread.validate().is_err());
    }

    #[test]
    fn test_auto_thread_count_is_positive() {
        assert!(XzConfig::default().thread_count() >= 1);
    }

    #[test]
    fn test_build_compressor_multi_thread() {
        let config = XzConfig {
            level: Some(1),
            thread: Some(2),
        };
        match config.build_compressor(Cursor::new(Vec::new())).unwrap() {
            Compressor::XzEncoder(_) => (),
            _ => panic!("Expected XzEncoder"),
        }
    }

    #[test]
    fn test_unset_fields_are_not_serialized() {
        let yaml = serde_yml::to_string(&XzConfig::default()).unwrap();
        assert!(!yaml.contains("level"));
        assert!(!yaml.contains("thread"));
    }
}
