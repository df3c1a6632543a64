//! Renderer trait and shared types.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

/// Context shared by every render in a batch.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Base URL of the site being rendered. Routes are joined onto this.
    pub site_base: Url,

    /// How long a page gets to finish loading.
    pub wait_budget: Duration,
}

impl RenderContext {
    pub fn new(mut site_base: Url, wait_budget: Duration) -> Self {
        if !site_base.path().ends_with('/') {
            let path = format!("{}/", site_base.path());
            site_base.set_path(&path);
        }

        Self {
            site_base,
            wait_budget,
        }
    }

    /// Absolute URL for a route.
    pub fn page_url(&self, route: &str) -> Result<Url, RenderError> {
        Ok(self.site_base.join(route.trim_start_matches('/'))?)
    }
}

/// Result of rendering a single route.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// The route that was rendered.
    pub route: String,

    /// Full HTML document.
    pub html: String,

    /// Wall-clock time the render took.
    pub duration: Duration,
}

/// Errors that can occur during rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to reach renderer at {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("navigation to {url} failed: {message}")]
    Navigate { url: String, message: String },

    #[error("timed out after {budget:?} waiting for {route} to load")]
    Timeout { route: String, budget: Duration },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("origin returned {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid render URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A strategy for producing static HTML for a route.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renderer identifier (e.g., "chrome", "origin").
    fn name(&self) -> &'static str;

    /// Render a route to a full HTML document.
    async fn render(&self, route: &str, ctx: &RenderContext) -> Result<RenderedPage, RenderError>;
}
