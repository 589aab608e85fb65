//! Event pipeline: replaces each newly uploaded object with a zip archive of itself.
//!
//! For every record of an "object created" notification, in delivery order:
//!   1. Download the object into the staging directory, named after the key's base name
//!   2. Classify the staged file; objects that are already zip containers are left alone
//!   3. Compress the staged file into a single-entry deflated zip archive
//!   4. Upload the archive to the same bucket under `<stem>.zip`
//!   5. Delete the original object, unless the archive was uploaded under the same key
//!
//! # Error Handling
//! A failed step logs the bucket/key context and abandons the current record only. The
//! original is deleted only after a successful upload. A panic while processing one record
//! is caught and logged, and the loop moves on to the next record.
//!
//! [`Pipeline::handle_event`] never fails: it always answers with status code 200. Per-record
//! outcomes are available in-process through [`InvocationOutcome::report`].
//!
//! # Logging
//! All progress and failures go through `tracing`. Install a subscriber (or a scoped default
//! in tests) to route or capture them.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::archive::{self, object_base_name, CompressedArchive};
use crate::config::PipelineConfig;
use crate::contract::{FileTypeDetector, ObjectStore};
use crate::detect::ZIP_MIME;
use crate::notification::{parse_records, NotificationRecord};

/// Status code reported to the trigger for every invocation.
pub const STATUS_OK: u16 = 200;

/// Pipeline step that can abandon a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Download,
    Compress,
    Upload,
    Delete,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Download => "download",
            Step::Compress => "compress",
            Step::Upload => "upload",
            Step::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: Step,
    pub reason: String,
}

impl StepFailure {
    pub fn new(step: Step, reason: impl fmt::Display) -> Self {
        Self {
            step,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.step, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Archive uploaded and original deleted.
    Processed { archive_key: String },
    /// Object was already a zip container; storage untouched.
    AlreadyCompressed,
    /// Record could not be read from the notification.
    Skipped { reason: String },
    Failed(StepFailure),
    Panicked { message: String },
}

#[derive(Debug, Clone)]
pub struct RecordReport {
    pub bucket_name: Option<String>,
    pub object_key: Option<String>,
    pub outcome: RecordOutcome,
}

/// Per-record outcomes of one invocation, in delivery order.
#[derive(Debug, Clone, Default)]
pub struct InvocationReport {
    pub records: Vec<RecordReport>,
}

impl InvocationReport {
    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Processed { .. }))
    }

    /// Records that needed no work or could not be read.
    pub fn skipped(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                RecordOutcome::AlreadyCompressed | RecordOutcome::Skipped { .. }
            )
        })
    }

    pub fn failed(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                RecordOutcome::Failed(_) | RecordOutcome::Panicked { .. }
            )
        })
    }

    fn count(&self, pred: impl Fn(&RecordOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Result of [`Pipeline::handle_event`]. Serialises as `{"statusCode":200}`.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationOutcome {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(skip)]
    pub report: InvocationReport,
}

impl InvocationOutcome {
    fn ok(report: InvocationReport) -> Self {
        Self {
            status_code: STATUS_OK,
            report,
        }
    }
}

pub struct Pipeline<S, D> {
    config: PipelineConfig,
    store: S,
    detector: D,
}

impl<S, D> Pipeline<S, D>
where
    S: ObjectStore,
    D: FileTypeDetector,
{
    pub fn new(config: PipelineConfig, store: S, detector: D) -> Self {
        Self {
            config,
            store,
            detector,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Entrypoint: process every record of an S3 notification, one at a time.
    pub async fn handle_event(&self, event: &Value) -> InvocationOutcome {
        let mut report = InvocationReport::default();

        let records = match parse_records(event) {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "[PIPELINE][ERROR] Notification has no records to process");
                return InvocationOutcome::ok(report);
            }
        };
        info!(records = records.len(), "[PIPELINE] Handling notification");

        for parsed in records {
            let record = match parsed {
                Ok(record) => record,
                Err(e) => {
                    error!(error = %e, "[PIPELINE][ERROR] Skipping malformed record");
                    report.records.push(RecordReport {
                        bucket_name: None,
                        object_key: None,
                        outcome: RecordOutcome::Skipped {
                            reason: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            let outcome = match AssertUnwindSafe(self.process_record(&record))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        bucket = %record.bucket_name,
                        key = %record.object_key,
                        event = ?record.event_name,
                        panic = %message,
                        "[PIPELINE][ERROR] Unexpected failure while processing record"
                    );
                    RecordOutcome::Panicked { message }
                }
            };

            report.records.push(RecordReport {
                bucket_name: Some(record.bucket_name),
                object_key: Some(record.object_key),
                outcome,
            });
        }

        info!(
            processed = report.processed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "[PIPELINE] Notification handled"
        );
        InvocationOutcome::ok(report)
    }

    /// Runs all steps for a single record, stopping at the first failed one.
    pub async fn process_record(&self, record: &NotificationRecord) -> RecordOutcome {
        let bucket = record.bucket_name.as_str();
        let key = record.object_key.as_str();
        info!(bucket = %bucket, key = %key, "[PIPELINE] New object uploaded to bucket");

        let staged = match self.download_object(bucket, key).await {
            Ok(path) => path,
            Err(failure) => {
                error!(bucket = %bucket, key = %key, "[PIPELINE][ERROR] Download error");
                return RecordOutcome::Failed(failure);
            }
        };

        if let Some(mime) = self.detect_file_type(&staged) {
            if mime == ZIP_MIME {
                warn!(bucket = %bucket, key = %key, "[PIPELINE] File already in compressed format, leaving it untouched");
                return RecordOutcome::AlreadyCompressed;
            }
        }

        let archive = match self.compress_to_zip(&staged) {
            Ok(archive) => archive,
            Err(failure) => {
                error!(bucket = %bucket, key = %key, "[PIPELINE][ERROR] Compression error");
                return RecordOutcome::Failed(failure);
            }
        };

        if let Err(failure) = self
            .upload_object(&archive.archive_path, bucket, &archive.archive_key)
            .await
        {
            error!(
                bucket = %bucket,
                archive_key = %archive.archive_key,
                "[PIPELINE][ERROR] Upload error, original kept"
            );
            return RecordOutcome::Failed(failure);
        }

        if archive.archive_key == key {
            // The upload overwrote the original; deleting it would remove the archive.
            info!(
                bucket = %bucket,
                key = %key,
                "[PIPELINE] Archive replaced the original in place, nothing to delete"
            );
        } else if let Err(failure) = self.delete_object(bucket, key).await {
            error!(
                bucket = %bucket,
                key = %key,
                archive_key = %archive.archive_key,
                "[PIPELINE][ERROR] Delete error, archive and original both present"
            );
            return RecordOutcome::Failed(failure);
        }

        info!(key = %key, bucket = %bucket, archive_key = %archive.archive_key, "[PIPELINE] Object has been processed");
        RecordOutcome::Processed {
            archive_key: archive.archive_key,
        }
    }

    /// Stages `bucket`/`key` as `<staging_dir>/<base name of key>`.
    pub async fn download_object(&self, bucket: &str, key: &str) -> Result<PathBuf, StepFailure> {
        let file_name = object_base_name(key).ok_or_else(|| {
            error!(bucket = %bucket, key = %key, "Object key has no usable file name");
            StepFailure::new(Step::Download, format!("key '{key}' has no file name"))
        })?;

        if let Err(e) = std::fs::create_dir_all(&self.config.staging_dir) {
            error!(
                staging_dir = %self.config.staging_dir.display(),
                error = %e,
                "Failed to create staging directory"
            );
            return Err(StepFailure::new(Step::Download, e));
        }

        let destination = self.config.staging_dir.join(file_name);
        match self.store.download(bucket, key, &destination).await {
            Ok(()) => {
                info!(bucket = %bucket, key = %key, path = %destination.display(), "Downloaded object");
                Ok(destination)
            }
            Err(e) => {
                error!(bucket = %bucket, key = %key, error = %e, "An error occurred while downloading from bucket");
                Err(StepFailure::new(Step::Download, e))
            }
        }
    }

    pub fn detect_file_type(&self, path: &Path) -> Option<String> {
        let mime = self.detector.detect(path);
        info!(path = %path.display(), mime = mime.as_deref().unwrap_or("unknown"), "Detected file type");
        mime
    }

    pub fn compress_to_zip(&self, path: &Path) -> Result<CompressedArchive, StepFailure> {
        archive::compress_to_zip(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "Compression failed");
            StepFailure::new(Step::Compress, e)
        })
    }

    pub async fn upload_object(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<(), StepFailure> {
        info!(key = %key, path = %path.display(), bucket = %bucket, "Uploading file");
        match self.store.upload(path, bucket, key).await {
            Ok(()) => {
                info!(key = %key, bucket = %bucket, "Upload successful");
                Ok(())
            }
            Err(e) => {
                error!(key = %key, bucket = %bucket, error = %e, "Upload failed");
                Err(StepFailure::new(Step::Upload, e))
            }
        }
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StepFailure> {
        info!(key = %key, bucket = %bucket, "Deleting object");
        match self.store.delete(bucket, key).await {
            Ok(()) => {
                info!(key = %key, bucket = %bucket, "Object deleted");
                Ok(())
            }
            Err(e) => {
                error!(key = %key, bucket = %bucket, error = %e, "Deletion failed");
                Err(StepFailure::new(Step::Delete, e))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
