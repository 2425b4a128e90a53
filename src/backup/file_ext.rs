use std::sync::Arc;

/// Something that contributes a segment to the bundle file extension.
pub trait FileExtProvider {
    fn file_ext(&self) -> Option<Arc<str>>;
}
