//! Continuous polling command.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use kiln_pipeline::Poller;

use crate::config::{build_pipeline, load_config};

/// Run the watch command.
pub async fn run(config_path: &Path, interval: Option<u64>) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = build_pipeline(&config)?;

    let secs = interval.unwrap_or(config.watch.interval_secs);
    tracing::info!("Watching {} every {}s", config.content.api_url, secs);

    Poller::new(Duration::from_secs(secs)).run(&pipeline).await?;

    Ok(())
}
