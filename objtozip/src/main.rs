use anyhow::Result;
use clap::Parser;
use objtozip::cli::{run, Cli};
use tracing_subscriber::EnvFilter;

/// Selects JSON log lines (e.g. for CloudWatch) when set to `json`.
const ENV_LOG_FORMAT: &str = "OBJTOZIP_LOG_FORMAT";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();
    tracing::info!("Application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("objtozip completed successfully"),
        Err(e) => tracing::error!(error = %e, "objtozip exited with error"),
    }
    result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
