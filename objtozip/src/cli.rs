///
/// This module implements the CLI interface for objtozip: command parsing and the entrypoints
/// for running as a Lambda function or processing a single notification locally.
///
/// All pipeline logic lives in the [`objtozip-core`] crate; this module is glue only.
///
/// ## Subcommands
/// - `serve`: run the AWS Lambda runtime loop, one pipeline invocation per S3 notification.
/// - `handle --event <file>`: process one notification JSON file against S3 and print the
///   invocation result.
///
/// [`objtozip-core`]: ../../objtozip-core/
use crate::handler::{build_pipeline, function_handler};
use crate::load_config::load_config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lambda_runtime::service_fn;
use serde_json::Value;
use std::path::PathBuf;

/// CLI for objtozip: replace uploaded bucket objects with zip archives.
#[derive(Parser)]
#[clap(
    name = "objtozip",
    version,
    about = "Compress newly uploaded S3 objects into zip archives and replace the originals"
)]
pub struct Cli {
    /// Path to an optional YAML config file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as an AWS Lambda function triggered by S3 notifications
    Serve,
    /// Process a single S3 notification JSON file and print the result
    Handle {
        /// Path to the notification JSON file
        #[clap(long)]
        event: PathBuf,
    },
}

/// Async CLI entrypoint for main() and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    config.pipeline.trace_loaded();

    match cli.command {
        Commands::Serve => {
            tracing::info!(command = "serve", "Starting Lambda runtime");
            let pipeline = build_pipeline(&config).await;
            lambda_runtime::run(service_fn(|event| function_handler(event, &pipeline)))
                .await
                .map_err(|e| anyhow::anyhow!(e))
        }
        Commands::Handle { event } => {
            tracing::info!(command = "handle", event_path = %event.display(), "Processing notification file");
            let raw = std::fs::read_to_string(&event)
                .with_context(|| format!("Failed to read event file {:?}", event))?;
            let payload: Value = serde_json::from_str(&raw)
                .with_context(|| format!("Event file {:?} is not valid JSON", event))?;

            let pipeline = build_pipeline(&config).await;
            let outcome = pipeline.handle_event(&payload).await;
            tracing::info!(
                command = "handle",
                processed = outcome.report.processed(),
                skipped = outcome.report.skipped(),
                failed = outcome.report.failed(),
                "Notification processed"
            );
            println!("{}", serde_json::to_string(&outcome)?);
            Ok(())
        }
    }
}
