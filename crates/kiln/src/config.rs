//! Configuration file (kiln.toml) and pipeline assembly.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use kiln_content::{ClientConfig, ContentClient, ContentKind};
use kiln_pipeline::{Pipeline, PipelineConfig, RenderScheduler, RouteRules};
use kiln_render::{ChromeRenderer, OriginRenderer, RenderContext, Renderer};
use kiln_store::ArtifactStore;

/// Configuration file structure (kiln.toml).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub content: ContentSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub watch: WatchSection,
    #[serde(default)]
    pub routes: RoutesSection,
}

#[derive(Debug, Deserialize)]
pub struct ContentSection {
    /// Root URL of the CMS installation
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Content collections to fetch
    #[serde(default = "default_kinds")]
    pub kinds: Vec<String>,

    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

#[derive(Debug, Deserialize)]
pub struct RenderSection {
    #[serde(default)]
    pub mode: RenderMode,

    /// Base URL of the site the renderer loads
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Local remote-debugging port of the headless browser
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// SSR origin to capture from in "origin" mode (defaults to site_url)
    #[serde(default)]
    pub origin_url: Option<String>,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-page load budget in milliseconds
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
}

/// How pages get turned into HTML.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Chrome,
    Origin,
}

#[derive(Debug, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Absolute base URL written into the sitemap
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

#[derive(Debug, Deserialize)]
pub struct WatchSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct RoutesSection {
    /// Per-kind permalink patterns, e.g. posts = "/blog/{slug}/"
    #[serde(default)]
    pub patterns: BTreeMap<String, String>,

    /// Routes re-rendered whenever anything changed
    #[serde(default = "default_always")]
    pub always: Vec<String>,
}

fn default_api_url() -> String {
    "http://localhost:8080/".to_string()
}
fn default_kinds() -> Vec<String> {
    vec!["posts".to_string(), "pages".to_string()]
}
fn default_per_page() -> usize {
    100
}
fn default_site_url() -> String {
    "http://localhost:4200/".to_string()
}
fn default_debug_port() -> u16 {
    9222
}
fn default_concurrency() -> usize {
    4
}
fn default_wait_ms() -> u64 {
    10_000
}
fn default_output_dir() -> String {
    "dist".to_string()
}
fn default_public_url() -> String {
    "http://localhost:4000/".to_string()
}
fn default_interval_secs() -> u64 {
    60
}
fn default_always() -> Vec<String> {
    vec!["/".to_string()]
}

impl Default for ContentSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            kinds: default_kinds(),
            per_page: default_per_page(),
        }
    }
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            mode: RenderMode::default(),
            site_url: default_site_url(),
            debug_port: default_debug_port(),
            origin_url: None,
            concurrency: default_concurrency(),
            wait_ms: default_wait_ms(),
        }
    }
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            public_url: default_public_url(),
        }
    }
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for RoutesSection {
    fn default() -> Self {
        Self {
            patterns: BTreeMap::new(),
            always: default_always(),
        }
    }
}

/// Load configuration from kiln.toml if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}

/// Assemble the pipeline a config describes.
pub fn build_pipeline(config: &ConfigFile) -> Result<Pipeline> {
    let api_url = Url::parse(&config.content.api_url).context("Invalid content.api_url")?;
    let mut client_config = ClientConfig::new(api_url);
    client_config.per_page = config.content.per_page;
    let client = ContentClient::new(client_config)?;

    let kinds = config
        .content
        .kinds
        .iter()
        .map(|kind| ContentKind::new(kind.clone()))
        .collect();

    let scheduler = RenderScheduler::new(RouteRules::new(
        config.routes.patterns.clone(),
        config.routes.always.clone(),
    ));

    let site_url = Url::parse(&config.render.site_url).context("Invalid render.site_url")?;
    let ctx = RenderContext::new(site_url, Duration::from_millis(config.render.wait_ms));

    let renderer: Box<dyn Renderer> = match config.render.mode {
        RenderMode::Chrome => Box::new(ChromeRenderer::new(config.render.debug_port)?),
        RenderMode::Origin => {
            let raw = config
                .render
                .origin_url
                .as_deref()
                .unwrap_or(&config.render.site_url);
            let origin = Url::parse(raw).context("Invalid render.origin_url")?;
            Box::new(OriginRenderer::new(
                origin,
                Duration::from_millis(config.render.wait_ms),
            )?)
        }
    };

    let store = ArtifactStore::new(PathBuf::from(&config.output.dir));

    Ok(Pipeline::new(
        client,
        scheduler,
        renderer,
        store,
        ctx,
        PipelineConfig {
            kinds,
            concurrency: config.render.concurrency,
            public_base: config.output.public_url.clone(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = ConfigFile::default();

        assert_eq!(config.content.per_page, 100);
        assert_eq!(config.render.mode, RenderMode::Chrome);
        assert_eq!(config.render.debug_port, 9222);
        assert_eq!(config.output.dir, "dist");
        assert_eq!(config.routes.always, vec!["/".to_string()]);
    }

    #[test]
    fn parses_full_config() {
        let raw = r#"
[content]
api_url = "https://cms.example.com/"
kinds = ["posts"]
per_page = 25

[render]
mode = "origin"
site_url = "https://example.com/"
origin_url = "http://localhost:4200/"
concurrency = 8

[output]
dir = "public"
public_url = "https://example.com/"

[watch]
interval_secs = 30

[routes]
always = ["/", "/blog/"]

[routes.patterns]
posts = "/blog/{slug}/"
"#;

        let config: ConfigFile = toml::from_str(raw).unwrap();

        assert_eq!(config.content.kinds, vec!["posts".to_string()]);
        assert_eq!(config.content.per_page, 25);
        assert_eq!(config.render.mode, RenderMode::Origin);
        assert_eq!(config.render.concurrency, 8);
        assert_eq!(config.output.dir, "public");
        assert_eq!(config.watch.interval_secs, 30);
        assert_eq!(config.routes.patterns["posts"], "/blog/{slug}/");
        assert_eq!(config.routes.always.len(), 2);
    }

    #[test]
    fn missing_config_file_loads_defaults() {
        let temp = tempfile::tempdir().unwrap();

        let config = load_config(&temp.path().join("kiln.toml")).unwrap();

        assert_eq!(config.output.dir, "dist");
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("kiln.toml");
        fs::write(&path, "[content\napi_url = ").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn builds_pipeline_from_defaults() {
        let config = ConfigFile::default();

        assert!(build_pipeline(&config).is_ok());
    }
}
