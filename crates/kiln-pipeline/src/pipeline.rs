//! The detect -> schedule -> render -> store cycle.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use futures::{stream, StreamExt};

use kiln_content::{ContentClient, ContentItem, ContentKind, FetchError};
use kiln_render::{RenderContext, RenderError, Renderer};
use kiln_store::{ArtifactStore, Manifest, StoreError};

use crate::scheduler::{PlannedRoute, RenderScheduler};

/// Pipeline-level settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Content collections to fetch.
    pub kinds: Vec<ContentKind>,

    /// How many routes render at once.
    pub concurrency: usize,

    /// Absolute base URL used in the sitemap.
    pub public_base: String,
}

/// Errors that abort a pipeline cycle.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counts from one pipeline cycle.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Content items fetched across all collections.
    pub fetched: usize,

    /// Items the change detector flagged.
    pub changed: usize,

    /// Routes rendered and written.
    pub rendered: usize,

    /// Routes whose render failed.
    pub failed: usize,

    /// Artifacts removed.
    pub pruned: usize,

    /// Wall-clock time for the cycle in milliseconds.
    pub duration_ms: u64,
}

struct RenderOutcome {
    rendered: usize,
    failed: usize,
    /// Item keys behind failed routes; kept out of the index so the next
    /// cycle retries them.
    failed_sources: BTreeSet<String>,
}

/// Wires the content client, scheduler, renderer, and store into the
/// linear prerender pipeline.
pub struct Pipeline {
    client: ContentClient,
    scheduler: RenderScheduler,
    renderer: Box<dyn Renderer>,
    store: ArtifactStore,
    ctx: RenderContext,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        client: ContentClient,
        scheduler: RenderScheduler,
        renderer: Box<dyn Renderer>,
        store: ArtifactStore,
        ctx: RenderContext,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            scheduler,
            renderer,
            store,
            ctx,
            config,
        }
    }

    /// Render every route from scratch, then prune and save state.
    pub async fn run_full(&self) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();

        let items = self.fetch_content().await?;
        let mut manifest = Manifest::load(self.store.root())?;

        let plan = self.scheduler.plan_all(&items);
        tracing::info!("rendering {} routes with {}", plan.len(), self.renderer.name());

        let outcome = self.render_routes(&plan.renders, &mut manifest).await?;

        let live = self.scheduler.live_routes(&items);
        let pruned = self.store.prune(&live, &mut manifest)?;
        self.store.write_sitemap(&live, &self.config.public_base)?;

        manifest.index.apply_except(&items, &outcome.failed_sources);
        manifest.save(self.store.root())?;

        Ok(PipelineReport {
            fetched: items.len(),
            changed: items.len(),
            rendered: outcome.rendered,
            failed: outcome.failed,
            pruned,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Render only what changed since the last saved index.
    pub async fn run_incremental(&self) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();

        let items = self.fetch_content().await?;
        let mut manifest = Manifest::load(self.store.root())?;

        let changes = manifest.index.diff(&items);
        if changes.is_empty() {
            tracing::debug!("no content changes");
            return Ok(PipelineReport {
                fetched: items.len(),
                duration_ms: started.elapsed().as_millis() as u64,
                ..PipelineReport::default()
            });
        }

        tracing::info!(
            "{} created, {} updated, {} deleted",
            changes.created.len(),
            changes.updated.len(),
            changes.deleted.len()
        );

        let plan = self.scheduler.plan(&changes);

        let item_by_key: HashMap<String, &ContentItem> =
            items.iter().map(|item| (item.key(), item)).collect();

        // Always-refresh routes carry no sources and render unconditionally;
        // everything else goes through the manifest staleness check.
        let to_render: Vec<PlannedRoute> = plan
            .renders
            .into_iter()
            .filter(|planned| {
                if planned.sources.is_empty() {
                    return true;
                }
                let associated: Vec<&ContentItem> = planned
                    .sources
                    .iter()
                    .filter_map(|key| item_by_key.get(key).copied())
                    .collect();
                manifest.is_stale(&planned.route, &associated)
            })
            .collect();

        let outcome = self.render_routes(&to_render, &mut manifest).await?;

        let live = self.scheduler.live_routes(&items);
        let pruned = self.store.prune(&live, &mut manifest)?;
        self.store.write_sitemap(&live, &self.config.public_base)?;

        manifest.index.apply_except(&items, &outcome.failed_sources);
        manifest.save(self.store.root())?;

        Ok(PipelineReport {
            fetched: items.len(),
            changed: changes.len(),
            rendered: outcome.rendered,
            failed: outcome.failed,
            pruned,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn fetch_content(&self) -> Result<Vec<ContentItem>, PipelineError> {
        let mut items = Vec::new();

        for kind in &self.config.kinds {
            items.extend(self.client.fetch_all(kind).await?);
        }

        Ok(items)
    }

    /// Render a batch of routes through a bounded concurrent stream and
    /// write the results. A failed route is logged and counted; it does
    /// not abort the batch. Store failures do.
    async fn render_routes(
        &self,
        planned: &[PlannedRoute],
        manifest: &mut Manifest,
    ) -> Result<RenderOutcome, PipelineError> {
        let width = self.config.concurrency.max(1);

        let results: Vec<(&PlannedRoute, Result<kiln_render::RenderedPage, RenderError>)> =
            stream::iter(planned)
                .map(|planned| async move {
                    (planned, self.renderer.render(&planned.route, &self.ctx).await)
                })
                .buffer_unordered(width)
                .collect()
                .await;

        let mut outcome = RenderOutcome {
            rendered: 0,
            failed: 0,
            failed_sources: BTreeSet::new(),
        };

        for (planned, result) in results {
            match result {
                Ok(page) => {
                    let hash = ArtifactStore::content_hash(&page.html);
                    self.store.write(&planned.route, &page.html)?;
                    manifest.record(&planned.route, hash, planned.sources.clone());
                    outcome.rendered += 1;
                    tracing::info!("rendered {} in {:?}", planned.route, page.duration);
                }
                Err(e) => {
                    outcome.failed += 1;
                    outcome.failed_sources.extend(planned.sources.iter().cloned());
                    tracing::warn!("render failed for {}: {}", planned.route, e);
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::Query;
    use axum::response::Html;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use url::Url;

    use crate::routes::RouteRules;
    use kiln_content::ClientConfig;
    use kiln_render::OriginRenderer;

    async fn spawn(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn post(id: u64, slug: &str, modified: &str) -> Value {
        json!({
            "id": id,
            "slug": slug,
            "link": format!("https://example.com/{}/", slug),
            "modified_gmt": modified,
            "title": {"rendered": slug}
        })
    }

    /// Mock CMS that serves revision 0 until bumped: revision 1 edits
    /// "hello" and deletes "world".
    async fn spawn_cms(revision: Arc<AtomicU8>) -> SocketAddr {
        let posts = move |Query(params): Query<std::collections::HashMap<String, String>>| {
            let revision = revision.clone();
            async move {
                let page: usize = params["page"].parse().unwrap();
                if page > 1 {
                    return Json(json!([]));
                }
                let body = match revision.load(Ordering::SeqCst) {
                    0 => json!([
                        post(1, "hello", "2024-01-01T00:00:00"),
                        post(2, "world", "2024-01-01T00:00:00"),
                    ]),
                    // The edit has to land after the artifact's generation
                    // time for the route to count as stale.
                    _ => json!([post(1, "hello", "2999-01-01T00:00:00")]),
                };
                Json(body)
            }
        };

        spawn(Router::new().route("/wp-json/wp/v2/posts", get(posts))).await
    }

    /// Mock origin that serves HTML for every route.
    async fn spawn_origin() -> SocketAddr {
        async fn page(uri: axum::http::Uri) -> Html<String> {
            Html(format!("<html><body>{}</body></html>", uri.path()))
        }

        spawn(Router::new().fallback(get(page))).await
    }

    fn pipeline_for(cms: SocketAddr, origin: SocketAddr, out: &std::path::Path) -> Pipeline {
        let mut client_config = ClientConfig::new(Url::parse(&format!("http://{cms}")).unwrap());
        client_config.per_page = 10;
        let client = ContentClient::new(client_config).unwrap();

        let scheduler = RenderScheduler::new(RouteRules::new(
            [("posts".to_string(), "/blog/{slug}/".to_string())]
                .into_iter()
                .collect(),
            vec!["/".to_string()],
        ));

        let origin_url = Url::parse(&format!("http://{origin}")).unwrap();
        let renderer =
            Box::new(OriginRenderer::new(origin_url.clone(), Duration::from_secs(5)).unwrap());

        let ctx = RenderContext::new(origin_url, Duration::from_secs(5));

        Pipeline::new(
            client,
            scheduler,
            renderer,
            ArtifactStore::new(out),
            ctx,
            PipelineConfig {
                kinds: vec![ContentKind::from("posts")],
                concurrency: 2,
                public_base: "https://example.com".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn full_run_renders_everything() {
        let revision = Arc::new(AtomicU8::new(0));
        let cms = spawn_cms(revision).await;
        let origin = spawn_origin().await;
        let out = tempdir().unwrap();

        let pipeline = pipeline_for(cms, origin, out.path());
        let report = pipeline.run_full().await.unwrap();

        assert_eq!(report.fetched, 2);
        assert_eq!(report.rendered, 3); // two posts plus "/"
        assert_eq!(report.failed, 0);
        assert!(out.path().join("index.html").exists());
        assert!(out.path().join("blog/hello/index.html").exists());
        assert!(out.path().join("blog/world/index.html").exists());
        assert!(out.path().join("sitemap.xml").exists());
    }

    #[tokio::test]
    async fn incremental_run_is_idle_without_changes() {
        let revision = Arc::new(AtomicU8::new(0));
        let cms = spawn_cms(revision).await;
        let origin = spawn_origin().await;
        let out = tempdir().unwrap();

        let pipeline = pipeline_for(cms, origin, out.path());
        pipeline.run_full().await.unwrap();

        let report = pipeline.run_incremental().await.unwrap();

        assert_eq!(report.changed, 0);
        assert_eq!(report.rendered, 0);
        assert_eq!(report.pruned, 0);
    }

    #[tokio::test]
    async fn incremental_run_renders_edits_and_prunes_deletions() {
        let revision = Arc::new(AtomicU8::new(0));
        let cms = spawn_cms(revision.clone()).await;
        let origin = spawn_origin().await;
        let out = tempdir().unwrap();

        let pipeline = pipeline_for(cms, origin, out.path());
        pipeline.run_full().await.unwrap();

        revision.store(1, Ordering::SeqCst);
        let report = pipeline.run_incremental().await.unwrap();

        // hello edited + world deleted; re-renders hello and "/".
        assert_eq!(report.changed, 2);
        assert_eq!(report.rendered, 2);
        assert_eq!(report.pruned, 1);
        assert!(out.path().join("blog/hello/index.html").exists());
        assert!(!out.path().join("blog/world").exists());

        // And the cycle after that is idle again.
        let quiet = pipeline.run_incremental().await.unwrap();
        assert_eq!(quiet.rendered, 0);
    }

    #[tokio::test]
    async fn first_incremental_run_acts_like_full() {
        let revision = Arc::new(AtomicU8::new(0));
        let cms = spawn_cms(revision).await;
        let origin = spawn_origin().await;
        let out = tempdir().unwrap();

        let pipeline = pipeline_for(cms, origin, out.path());
        let report = pipeline.run_incremental().await.unwrap();

        assert_eq!(report.changed, 2);
        assert_eq!(report.rendered, 3);
        assert!(out.path().join("blog/hello/index.html").exists());
    }

    #[tokio::test]
    async fn failed_renders_are_retried_next_cycle() {
        let revision = Arc::new(AtomicU8::new(0));
        let cms = spawn_cms(revision).await;
        let out = tempdir().unwrap();

        // Origin that 500s for /blog/world/ only.
        async fn flaky(uri: axum::http::Uri) -> axum::response::Response {
            use axum::response::IntoResponse;
            if uri.path() == "/blog/world/" {
                axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
            } else {
                Html(format!("<html><body>{}</body></html>", uri.path())).into_response()
            }
        }
        let origin = spawn(Router::new().fallback(get(flaky))).await;

        let pipeline = pipeline_for(cms, origin, out.path());
        let report = pipeline.run_incremental().await.unwrap();

        assert_eq!(report.rendered, 2);
        assert_eq!(report.failed, 1);

        // The failed item stayed out of the index, so it is still a change.
        let retry = pipeline.run_incremental().await.unwrap();
        assert_eq!(retry.changed, 1);
        assert_eq!(retry.failed, 1);
    }
}
