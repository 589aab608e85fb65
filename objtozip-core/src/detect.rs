use std::path::Path;

use tracing::warn;

use crate::contract::FileTypeDetector;

/// MIME type of a zip container.
pub const ZIP_MIME: &str = "application/zip";

/// Classifies files by their leading magic bytes using the `infer` matchers.
#[derive(Debug, Default, Clone, Copy)]
pub struct InferDetector;

impl FileTypeDetector for InferDetector {
    fn detect(&self, path: &Path) -> Option<String> {
        match infer::get_from_path(path) {
            Ok(kind) => kind.map(|k| k.mime_type().to_owned()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read file for type detection");
                None
            }
        }
    }
}
