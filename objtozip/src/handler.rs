//! Lambda runtime adapter: hands each S3 notification payload to the pipeline.

use lambda_runtime::{Error, LambdaEvent};
use objtozip_core::contract::{FileTypeDetector, ObjectStore};
use objtozip_core::detect::InferDetector;
use objtozip_core::pipeline::{InvocationOutcome, Pipeline};
use serde_json::Value;

use crate::load_config::AppConfig;
use crate::storage::S3ObjectStore;

/// Pipeline backed by S3 and content-based type detection.
pub async fn build_pipeline(config: &AppConfig) -> Pipeline<S3ObjectStore, InferDetector> {
    let store = S3ObjectStore::from_settings(&config.storage).await;
    Pipeline::new(config.pipeline.clone(), store, InferDetector)
}

/// Handles one invocation. Record failures are logged by the pipeline; the response is
/// always `{"statusCode":200}`.
pub async fn function_handler<S, D>(
    event: LambdaEvent<Value>,
    pipeline: &Pipeline<S, D>,
) -> Result<InvocationOutcome, Error>
where
    S: ObjectStore,
    D: FileTypeDetector,
{
    let (payload, context) = event.into_parts();
    tracing::info!(request_id = %context.request_id, "Invocation received");

    let outcome = pipeline.handle_event(&payload).await;
    tracing::info!(
        request_id = %context.request_id,
        processed = outcome.report.processed(),
        skipped = outcome.report.skipped(),
        failed = outcome.report.failed(),
        "Invocation complete"
    );
    Ok(outcome)
}
