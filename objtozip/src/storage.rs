#![doc = "S3 implementation of the pipeline's object store, built on the AWS SDK."]
//
//! # S3 storage (CLI <-> Core)
//!
//! [`S3ObjectStore`] wires the [`ObjectStore`] trait from `objtozip-core` to Amazon S3 (or an
//! S3-compatible provider such as MinIO when an endpoint URL is configured).
//!
//! - Credentials and region come from the AWS default provider chain, with an optional
//!   region override from [`StorageSettings`].
//! - Downloads are written to a `.partial` file chunk by chunk and renamed into place once
//!   complete; uploads stream the file from disk.
//! - The staging directory is created by the pipeline, not here.
//! - Every call logs bucket, key and duration.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;

use objtozip_core::contract::{ObjectStore, StorageError};

use crate::load_config::StorageSettings;

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the AWS default config chain and the given settings.
    pub async fn from_settings(settings: &StorageSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let client = match &settings.endpoint_url {
            Some(endpoint) => {
                // S3-compatible providers generally need path-style addressing
                let s3_config = aws_sdk_s3::config::Builder::from(&shared)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&shared),
        };
        tracing::info!(
            region = ?shared.region(),
            endpoint_url = ?settings.endpoint_url,
            "Initialized S3 client"
        );

        Self { client }
    }
}

fn request_error<E, R>(e: &SdkError<E, R>) -> StorageError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    StorageError::Request(DisplayErrorContext(e).to_string())
}

fn content_type_for(key: &str) -> &'static str {
    if key.to_ascii_lowercase().ends_with(".zip") {
        "application/zip"
    } else {
        "application/octet-stream"
    }
}

/// Writes `body` to `<destination>.partial` and renames it into place once complete.
/// On failure the partial file is removed and `destination` is left as it was.
async fn stage_body(body: ByteStream, destination: &Path) -> Result<u64, StorageError> {
    let mut partial = destination.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let result = async {
        let size = write_chunks(body, &partial).await?;
        tokio::fs::rename(&partial, destination).await?;
        Ok::<_, StorageError>(size)
    }
    .await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    result
}

async fn write_chunks(mut body: ByteStream, path: &Path) -> Result<u64, StorageError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut size: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StorageError::Request(e.to_string()))?;
        size += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(size)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> Result<(), StorageError> {
        let start = Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(GetObjectError::NoSuchKey(_)) => StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                },
                _ => request_error(&e),
            })?;

        let size = stage_body(response.body, destination).await?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );
        Ok(())
    }

    async fn upload(&self, source: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        let start = Instant::now();

        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type_for(key))
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            source = %source.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let start = Instant::now();

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );
        Ok(())
    }
}
