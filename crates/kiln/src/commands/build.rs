//! Full render command.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::{build_pipeline, load_config};

/// Run the build command.
pub async fn run(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = output {
        config.output.dir = dir.display().to_string();
    }

    tracing::info!("Rendering full site from {}", config.content.api_url);

    let pipeline = build_pipeline(&config)?;
    let report = pipeline.run_full().await?;

    tracing::info!(
        "Rendered {} routes ({} failed, {} pruned) in {}ms",
        report.rendered,
        report.failed,
        report.pruned,
        report.duration_ms
    );
    tracing::info!("Output: {}", config.output.dir);

    if report.failed > 0 {
        anyhow::bail!("{} routes failed to render", report.failed);
    }

    Ok(())
}
