//! Initialize a kiln project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(yes: bool) -> Result<()> {
    tracing::info!("Initializing kiln...");

    let config_path = Path::new("kiln.toml");
    if config_path.exists() && !yes {
        tracing::warn!("kiln.toml already exists. Use --yes to overwrite.");
        return Ok(());
    }

    fs::write(config_path, DEFAULT_CONFIG).context("Failed to write kiln.toml")?;
    tracing::info!("Created kiln.toml");

    tracing::info!("Initialization complete!");
    tracing::info!("Point content.api_url at your CMS, then run 'kiln build'.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Kiln Configuration

[content]
# Root URL of the CMS installation (the content API lives under
# /wp-json/wp/v2/ below this)
api_url = "http://localhost:8080/"

# Content collections to fetch
kinds = ["posts", "pages"]

# Items per page when walking collections
per_page = 100

[render]
# "chrome" drives a headless browser over its remote-debugging port;
# "origin" captures HTML from a server that already renders full pages
mode = "chrome"

# Base URL of the site the renderer loads
site_url = "http://localhost:4200/"

# Remote-debugging port of the already-running browser
debug_port = 9222

# Routes rendered at once
concurrency = 4

# Per-page load budget in milliseconds
wait_ms = 10000

[output]
# Deployable output directory
dir = "dist"

# Absolute base URL written into the sitemap
public_url = "http://localhost:4000/"

[watch]
# Poll interval for 'kiln watch', in seconds
interval_secs = 60

[routes]
# Routes re-rendered whenever anything changed
always = ["/"]

# Per-kind permalink patterns ({slug} and {id} substitute)
[routes.patterns]
posts = "/blog/{slug}/"
pages = "/{slug}/"
"#;
