//! Headless browser renderer driven over the DevTools protocol.
//!
//! kiln attaches to an already-running browser listening on a local
//! debugging port; it never spawns one. Each render opens a fresh target,
//! navigates it, waits for the load event, captures the document, and
//! closes the target again.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::protocol::{Command, Envelope, TargetInfo};
use crate::traits::{RenderContext, RenderError, RenderedPage, Renderer};

/// Renderer backed by a headless browser's remote debugging endpoint.
pub struct ChromeRenderer {
    http: reqwest::Client,
    endpoint: String,
}

impl ChromeRenderer {
    /// Attach to a browser on `127.0.0.1:{debug_port}`.
    pub fn new(debug_port: u16) -> Result<Self, RenderError> {
        Self::with_endpoint(format!("http://127.0.0.1:{debug_port}"))
    }

    /// Attach to an explicit debugging endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, RenderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn drive(
        &self,
        target: &TargetInfo,
        url: &Url,
        route: &str,
        ctx: &RenderContext,
    ) -> Result<String, RenderError> {
        let mut session = TargetSession::connect(&target.web_socket_debugger_url).await?;

        session.call("Page.enable", Value::Null).await?;

        let navigated = session
            .call("Page.navigate", json!({ "url": url.as_str() }))
            .await?;
        if let Some(message) = navigated
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
        {
            return Err(RenderError::Navigate {
                url: url.to_string(),
                message: message.to_string(),
            });
        }

        tokio::time::timeout(ctx.wait_budget, session.wait_for_event("Page.loadEventFired"))
            .await
            .map_err(|_| RenderError::Timeout {
                route: route.to_string(),
                budget: ctx.wait_budget,
            })??;

        let evaluated = session
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": "document.documentElement.outerHTML",
                    "returnByValue": true,
                }),
            )
            .await?;
        let html = evaluated
            .pointer("/result/value")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RenderError::Protocol("Runtime.evaluate returned no string value".to_string())
            })?;

        session.close().await;

        // outerHTML drops the doctype; put it back so browsers stay out of
        // quirks mode.
        Ok(format!("<!DOCTYPE html>\n{html}"))
    }

    async fn open_target(&self) -> Result<TargetInfo, RenderError> {
        // Chrome requires PUT on /json/new since v111.
        let url = format!("{}/json/new?about:blank", self.endpoint);
        let response = self
            .http
            .put(&url)
            .send()
            .await
            .map_err(|e| RenderError::Connect {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RenderError::Connect {
                endpoint: self.endpoint.clone(),
                message: format!("/json/new returned {}", response.status()),
            });
        }

        response
            .json::<TargetInfo>()
            .await
            .map_err(|e| RenderError::Protocol(format!("bad /json/new payload: {e}")))
    }

    async fn close_target(&self, id: &str) -> Result<(), RenderError> {
        let url = format!("{}/json/close/{}", self.endpoint, id);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(RenderError::Protocol(format!(
                "/json/close returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn render(&self, route: &str, ctx: &RenderContext) -> Result<RenderedPage, RenderError> {
        let started = Instant::now();
        let url = ctx.page_url(route)?;

        let target = self.open_target().await?;
        let result = self.drive(&target, &url, route, ctx).await;

        // The target is closed whether the render succeeded or not.
        if let Err(e) = self.close_target(&target.id).await {
            tracing::warn!("failed to close target {}: {}", target.id, e);
        }

        let html = result?;

        tracing::debug!("rendered {} in {:?}", route, started.elapsed());

        Ok(RenderedPage {
            route: route.to_string(),
            html,
            duration: started.elapsed(),
        })
    }
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// One debugger socket, one target.
struct TargetSession {
    sink: WsSink,
    source: WsSource,
    next_id: u64,
}

impl TargetSession {
    async fn connect(ws_url: &str) -> Result<Self, RenderError> {
        let (stream, _response) =
            connect_async(ws_url)
                .await
                .map_err(|e| RenderError::Connect {
                    endpoint: ws_url.to_string(),
                    message: e.to_string(),
                })?;
        let (sink, source) = stream.split();

        Ok(Self {
            sink,
            source,
            next_id: 0,
        })
    }

    /// Send a command and wait for its response, skipping interleaved events.
    async fn call(&mut self, method: &'static str, params: Value) -> Result<Value, RenderError> {
        self.next_id += 1;
        let id = self.next_id;

        let command = Command::new(id, method, params);
        let text =
            serde_json::to_string(&command).map_err(|e| RenderError::Protocol(e.to_string()))?;
        self.sink
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| RenderError::Protocol(e.to_string()))?;

        loop {
            let envelope = self.next_envelope().await?;
            if envelope.is_response_to(id) {
                if let Some(error) = envelope.error {
                    return Err(RenderError::Protocol(format!(
                        "{} failed: {} ({})",
                        method, error.message, error.code
                    )));
                }
                return Ok(envelope.result.unwrap_or(Value::Null));
            }
        }
    }

    /// Discard frames until the named event arrives.
    async fn wait_for_event(&mut self, method: &str) -> Result<Value, RenderError> {
        loop {
            let envelope = self.next_envelope().await?;
            if envelope.is_event(method) {
                return Ok(envelope.params.unwrap_or(Value::Null));
            }
        }
    }

    async fn next_envelope(&mut self) -> Result<Envelope, RenderError> {
        loop {
            match self.source.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    let raw = String::from_utf8_lossy(text.as_bytes()).to_string();
                    return serde_json::from_str(&raw)
                        .map_err(|e| RenderError::Protocol(format!("bad frame: {e}")));
                }
                Some(Ok(WsMessage::Ping(payload))) => {
                    self.sink
                        .send(WsMessage::Pong(payload))
                        .await
                        .map_err(|e| RenderError::Protocol(e.to_string()))?;
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    return Err(RenderError::Protocol("debugger socket closed".to_string()));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(RenderError::Protocol(e.to_string())),
            }
        }
    }

    async fn close(mut self) {
        let _ = self.sink.send(WsMessage::Close(None)).await;
    }
}
