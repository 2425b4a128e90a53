pub mod xz;

use crate::backup::file_ext::FileExtProvider;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use derive_more::From;
use io_enum::Write;
use liblzma::write::XzEncoder;
use serde::Deserialize;
use std::io;
use std::io::Write;
use std::result;
use std::sync::{Arc, OnceLock};
use validator::{Validate, ValidationErrors};

/// Writer wrapper applied between the tar stream and the bundle file.
#[derive(Write, From)]
pub enum Compressor<W: Write> {
    None(W),
    XzEncoder(XzEncoder<W>),
}

/// Bundle compression, selected by `compressor_type` in the config file.
///
/// Bundles are xz compressed unless the config explicitly asks for `none`.
#[derive(Clone, From, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "compressor_type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum CompressorConfig {
    None,
    Xz(xz::XzConfig),
}

impl Default for CompressorConfig {
    fn default() -> Self {
        CompressorConfig::Xz(xz::XzConfig::default())
    }
}

impl Validate for CompressorConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            CompressorConfig::None => Ok(()),
            CompressorConfig::Xz(xz) => xz.validate(),
        }
    }
}

pub trait CompressorBuilder<W: Write> {
    fn build_compressor(&self, writer: W) -> Result<Compressor<W>>;
}

/// Flushes trailing stream data and hands back the inner writer.
pub trait Finish<O> {
    fn finish(self) -> io::Result<O>;
}

impl<W: Write> Finish<W> for Compressor<W> {
    fn finish(self) -> io::Result<W> {
        match self {
            Compressor::None(w) => Ok(w),
            Compressor::XzEncoder(w) => w.finish(),
        }
    }
}

impl<W: Write> CompressorBuilder<W> for CompressorConfig {
    fn build_compressor(&self, writer: W) -> Result<Compressor<W>> {
        match self {
            CompressorConfig::None => {
                tracing::debug!("Writing bundle without compression");
                Ok(Compressor::None(writer))
            }
            CompressorConfig::Xz(xz) => xz.build_compressor(writer),
        }
        .with_debug_object_and_fn_name(self.clone(), "build_compressor")
    }
}

static XZ_FILE_EXT: OnceLock<Arc<str>> = OnceLock::new();
impl FileExtProvider for CompressorConfig {
    fn file_ext(&self) -> Option<Arc<str>> {
        match self {
            CompressorConfig::None => None,
            CompressorConfig::Xz(_) => Some(XZ_FILE_EXT.get_or_init(|| "xz".into()).clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn test_default_is_xz() {
        assert!(matches!(CompressorConfig::default(), CompressorConfig::Xz(_)));
        assert_eq!(
            CompressorConfig::default().file_ext().as_deref(),
            Some("xz")
        );
        assert!(CompressorConfig::None.file_ext().is_none());
    }

    #[test]
    fn test_deserialize_tagged() {
        let none: CompressorConfig =
            serde_yml::from_str("compressor_type: none").unwrap();
        assert_eq!(none, CompressorConfig::None);

        let xz: CompressorConfig =
            serde_yml::from_str("compressor_type: xz\nlevel: 6\nthread: 1").unwrap();
        assert!(matches!(xz, CompressorConfig::Xz(_)));
        assert!(xz.validate().is_ok());
    }

    #[test]
    fn test_none_compressor_passes_bytes_through() {
        let mut compressor = CompressorConfig::None
            .build_compressor(Cursor::new(Vec::new()))
            .unwrap();
        compressor.write_all(b"plain bytes").unwrap();
        let inner = compressor.finish().unwrap();
        assert_eq!(inner.into_inner(), b"plain bytes");
    }

    #[test]
    fn test_xz_compressor_output_decodes() {
        let mut compressor = CompressorConfig::default()
            .build_compressor(Cursor::new(Vec::new()))
            .unwrap();
        compressor.write_all(b"hello hello hello").unwrap();
        let compressed = compressor.finish().unwrap().into_inner();

        let mut decoded = String::new();
        liblzma::read::XzDecoder::new(compressed.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "hello hello hello");
    }
}
