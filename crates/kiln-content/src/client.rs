//! Paginated REST client for the CMS content API.

use std::time::Duration;

use url::Url;

use crate::model::{ContentItem, ContentKind};

/// Pages beyond this are not fetched. Guards against an API that keeps
/// returning full pages forever.
const PAGE_CAP: usize = 1_000;

/// Configuration for [`ContentClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root URL of the CMS installation.
    pub base_url: Url,

    /// API path prefix under the base URL.
    pub api_root: String,

    /// Items per page requested from collection endpoints.
    pub per_page: usize,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Retries per request on transport errors and 5xx responses.
    pub retries: usize,

    /// Pause between retry attempts.
    pub backoff: Duration,
}

impl ClientConfig {
    pub fn new(mut base_url: Url) -> Self {
        // Joining relative paths drops the last segment unless the base
        // ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            base_url,
            api_root: "wp-json/wp/v2".to_string(),
            per_page: 100,
            timeout: Duration::from_secs(30),
            retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Errors that can occur while fetching content.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("content API returned {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid content API URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Client for a JSON content API following the `/wp-json/wp/v2/...`
/// path convention.
pub struct ContentClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ContentClient {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, config })
    }

    /// Fetch every item of a collection, walking `page=1..` until the API
    /// returns a short or empty page.
    pub async fn fetch_all(&self, kind: &ContentKind) -> Result<Vec<ContentItem>, FetchError> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            if page > PAGE_CAP {
                tracing::warn!(
                    "stopping pagination for {} at page cap {}",
                    kind,
                    PAGE_CAP
                );
                break;
            }

            let Some(mut batch) = self.fetch_page(kind, page).await? else {
                break;
            };

            let got = batch.len();
            for item in &mut batch {
                item.kind = kind.clone();
            }
            items.extend(batch);

            if got < self.config.per_page {
                break;
            }
            page += 1;
        }

        tracing::debug!("fetched {} items from collection {}", items.len(), kind);

        Ok(items)
    }

    /// Fetch a single page of a collection.
    ///
    /// Returns `None` past the end of the collection: WordPress answers
    /// HTTP 400 for a page number beyond the last one.
    async fn fetch_page(
        &self,
        kind: &ContentKind,
        page: usize,
    ) -> Result<Option<Vec<ContentItem>>, FetchError> {
        let url = self.collection_url(kind, page)?;
        let response = self.get_with_retry(&url).await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let batch = response
            .json::<Vec<ContentItem>>()
            .await
            .map_err(|e| FetchError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Some(batch))
    }

    async fn get_with_retry(&self, url: &Url) -> Result<reqwest::Response, FetchError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.http.get(url.clone()).send().await {
                Ok(response) if response.status().is_server_error() && attempt <= self.config.retries => {
                    tracing::warn!(
                        "{} returned {}, retrying ({}/{})",
                        url,
                        response.status(),
                        attempt,
                        self.config.retries
                    );
                    tokio::time::sleep(self.config.backoff).await;
                }
                Ok(response) => return Ok(response),
                Err(e) if attempt <= self.config.retries => {
                    tracing::warn!(
                        "request to {} failed: {}, retrying ({}/{})",
                        url,
                        e,
                        attempt,
                        self.config.retries
                    );
                    tokio::time::sleep(self.config.backoff).await;
                }
                Err(e) => return Err(FetchError::Transport(e)),
            }
        }
    }

    fn collection_url(&self, kind: &ContentKind, page: usize) -> Result<Url, FetchError> {
        let path = format!("{}/{}", self.config.api_root.trim_matches('/'), kind);
        let mut url = self.config.base_url.join(&path)?;

        url.query_pairs_mut()
            .append_pair("per_page", &self.config.per_page.to_string())
            .append_pair("page", &page.to_string())
            .append_pair("_fields", "id,slug,link,modified_gmt,title");

        Ok(url)
    }
}
