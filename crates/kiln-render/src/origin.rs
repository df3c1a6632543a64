//! Renderer that fetches pages from an SSR origin.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use url::Url;

use crate::traits::{RenderContext, RenderError, RenderedPage, Renderer};

/// Renderer for setups where a server already produces full HTML; kiln
/// just captures its responses.
pub struct OriginRenderer {
    http: reqwest::Client,
    origin: Url,
}

impl OriginRenderer {
    pub fn new(mut origin: Url, timeout: Duration) -> Result<Self, RenderError> {
        if !origin.path().ends_with('/') {
            let path = format!("{}/", origin.path());
            origin.set_path(&path);
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { http, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }
}

#[async_trait]
impl Renderer for OriginRenderer {
    fn name(&self) -> &'static str {
        "origin"
    }

    async fn render(&self, route: &str, _ctx: &RenderContext) -> Result<RenderedPage, RenderError> {
        let started = Instant::now();
        let url = self.origin.join(route.trim_start_matches('/'))?;

        let response = self.http.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(RenderError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let html = response.text().await?;

        tracing::debug!("captured {} from origin in {:?}", route, started.elapsed());

        Ok(RenderedPage {
            route: route.to_string(),
            html,
            duration: started.elapsed(),
        })
    }
}
