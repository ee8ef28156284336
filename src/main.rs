//! SuccessFactors API documentation generator
//!
//! Entry point for the batch binary.

use sf_odata_doc::config::Config;
use sf_odata_doc::pipeline;
use std::io;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    tracing::info!("Starting SuccessFactors API documentation generator...");

    let config = Config::load_default()?;
    let runtime_config = config.to_runtime()?;

    tracing::info!(
        "Configured for {} with {} entities",
        runtime_config.api_server,
        runtime_config.entities.len()
    );

    let summary = match pipeline::run(&runtime_config).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Run aborted: {:#}", e);
            return Err(e);
        }
    };

    tracing::info!(
        "Finished: {} dictionary fields, {} endpoints ({} failed), {} sheets written to {}",
        summary.dictionary_fields,
        summary.endpoints,
        summary.failed_endpoints,
        summary.sheets.len(),
        summary.report_path.display()
    );
    Ok(())
}
