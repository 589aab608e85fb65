//! # contract: collaborator interfaces for the pipeline
//!
//! The pipeline never talks to a storage backend or inspects file magic bytes
//! itself. It drives two collaborators through the traits below:
//!
//! - [`ObjectStore`]: download / upload / delete of bucket objects.
//! - [`FileTypeDetector`]: best-guess MIME type of a staged local file.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`, so tests (and downstream crates with the
//!   `test-export-mocks` feature) get `MockObjectStore` and `MockFileTypeDetector`.
//!
//! ## Implementors
//! - [`crate::detect::InferDetector`] for file types.
//! - The `objtozip` binary crate provides the S3-backed store.

use std::path::Path;

use async_trait::async_trait;
use mockall::automock;

/// Failure reported by an [`ObjectStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object '{key}' not found in bucket '{bucket}'")]
    NotFound { bucket: String, key: String },
    #[error("storage request failed: {0}")]
    Request(String),
    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage backend holding the bucket objects.
///
/// All methods are async and receive plain bucket/key strings; implementors own
/// client construction, credentials and transport.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch `bucket`/`key` and write its full contents to `destination`.
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> Result<(), StorageError>;

    /// Store the contents of the local file `source` as `bucket`/`key`.
    async fn upload(&self, source: &Path, bucket: &str, key: &str) -> Result<(), StorageError>;

    /// Remove `bucket`/`key`.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;
}

/// Content-based file classification.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait FileTypeDetector: Send + Sync {
    /// Returns the MIME type of the file at `path`, or `None` when it cannot be determined.
    fn detect(&self, path: &Path) -> Option<String>;
}
