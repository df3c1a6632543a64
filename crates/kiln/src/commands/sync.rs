//! One-shot incremental render command.

use std::path::Path;

use anyhow::Result;

use crate::config::{build_pipeline, load_config};

/// Run the sync command.
pub async fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = build_pipeline(&config)?;

    let report = pipeline.run_incremental().await?;

    if report.changed == 0 {
        tracing::info!("Everything up to date ({} items checked)", report.fetched);
    } else {
        tracing::info!(
            "{} items changed; rendered {} routes ({} failed, {} pruned) in {}ms",
            report.changed,
            report.rendered,
            report.failed,
            report.pruned,
            report.duration_ms
        );
    }

    Ok(())
}
