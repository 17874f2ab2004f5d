//! blobsync entry point.

mod azure;
mod config;
mod status;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use blobsync_pipeline::UploadPipeline;
use blobsync_state::StateTracker;
use blobsync_uploader::BlobStore;

use azure::AzureBlobStore;
use config::Settings;

#[derive(Debug, Parser)]
#[command(name = "blobsync")]
#[command(about = "Resumable folder upload to Azure Blob Storage", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "blobsync.toml")]
    config: PathBuf,

    /// Disable the periodic status reporter.
    #[arg(long)]
    no_status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,blobsync=debug")),
        )
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "starting blobsync");

    let settings = Settings::load(&cli.config)?;
    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!("{e}");
        }
        anyhow::bail!("configuration validation failed");
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("shutdown requested, finishing the file in flight");
                cancel.cancel();
            }
        });
    }

    let state = Arc::new(StateTracker::new());
    let reporter = (settings.status.enabled && !cli.no_status).then(|| {
        status::spawn(
            Arc::clone(&state),
            Duration::from_millis(settings.status.refresh_ms.max(100)),
            cancel.clone(),
        )
    });

    let blob_store: Arc<dyn BlobStore> = Arc::new(AzureBlobStore::new(&settings.azure));
    let pipeline = UploadPipeline::new(
        settings.pipeline_settings(),
        blob_store,
        Arc::clone(&state),
        cancel.clone(),
    );

    let summary = pipeline.run().await?;

    cancel.cancel();
    if let Some(handle) = reporter {
        let _ = handle.await;
    }

    if summary.cancelled {
        info!("stopped before discovery was exhausted; re-run to resume");
    }
    Ok(())
}
