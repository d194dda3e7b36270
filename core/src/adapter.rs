//! Transport adapters: the step that actually moves bytes.
//!
//! # Design
//! The pipeline only knows the `Adapter` trait. `UreqAdapter` is the
//! process-wide default: it runs a blocking `ureq` exchange on tokio's
//! blocking pool and races it against the request's cancel token, so a
//! cancellation settles the request without waiting for the socket. The
//! blocking call itself runs to completion in the background, bounded only
//! by the request's `timeout` when one is set.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::RequestConfig;
use crate::error::{Error, Result};
use crate::http::{Headers, Method, Response};
use crate::url::{build_url, combine_urls, is_absolute_url};

/// Performs one HTTP exchange for a fully prepared config.
///
/// Implementations receive flattened headers and already-transformed data.
/// A failure that arrived with a response should carry it
/// (`Error::Status`, or `Error::Transport` with `response`) so response
/// transforms and interceptors can still see it.
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn send(&self, config: RequestConfig) -> Result<Response>;
}

struct FnAdapter<F>(F);

#[async_trait]
impl<F, Fut> Adapter for FnAdapter<F>
where
    F: Fn(RequestConfig) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    async fn send(&self, config: RequestConfig) -> Result<Response> {
        (self.0)(config).await
    }
}

/// Wrap an async closure as an adapter.
pub fn adapter_fn<F, Fut>(f: F) -> Arc<dyn Adapter>
where
    F: Fn(RequestConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    Arc::new(FnAdapter(f))
}

/// The adapter used when a config does not name one.
pub fn default_adapter() -> Arc<dyn Adapter> {
    static DEFAULT: OnceLock<Arc<dyn Adapter>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| Arc::new(UreqAdapter::new()))
        .clone()
}

/// Resolve or reject `response` according to the config's `validate_status`.
/// Without a validator every status resolves.
pub fn settle(response: Response) -> Result<Response> {
    let valid = match &response.config.validate_status {
        Some(validate) => validate(response.status),
        None => true,
    };
    if valid {
        Ok(response)
    } else {
        Err(Error::Status(Box::new(response)))
    }
}

/// Full request url: `base_url` joined with a relative `url`, then params.
pub fn full_url(config: &RequestConfig) -> Result<String> {
    let url = config.url.as_deref().unwrap_or_default();
    let joined = match config.base_url.as_deref() {
        Some(base) if !is_absolute_url(url) => combine_urls(base, url),
        _ => url.to_string(),
    };
    if !is_absolute_url(&joined) {
        return Err(Error::InvalidUrl(joined));
    }
    Ok(build_url(
        &joined,
        config.params.as_ref(),
        config.params_serializer.as_ref(),
    ))
}

/// Default transport backed by `ureq`.
///
/// Clones share one agent and with it the connection pool. The per-request
/// `timeout` is applied to each request, not to the agent.
#[derive(Debug, Clone)]
pub struct UreqAdapter {
    agent: ureq::Agent,
}

impl UreqAdapter {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqAdapter {
    fn default() -> Self {
        Self::new()
    }
}

struct RawResponse {
    status: u16,
    status_text: String,
    headers: Headers,
    body: String,
}

#[async_trait]
impl Adapter for UreqAdapter {
    async fn send(&self, config: RequestConfig) -> Result<Response> {
        let url = full_url(&config)?;
        let method = config.method.unwrap_or_default();
        let headers: Vec<(String, String)> = config
            .headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let body = match &config.data {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(serde_json::to_string(other)?),
        };
        let timeout = config.timeout;

        tracing::debug!(%method, %url, "sending request");
        let agent = self.agent.clone();
        let exchange = tokio::task::spawn_blocking(move || {
            execute(&agent, method, &url, &headers, body, timeout)
        });

        let raw = match &config.cancel_token {
            Some(token) => tokio::select! {
                joined = exchange => joined,
                reason = token.cancelled() => return Err(Error::Cancelled(reason)),
            },
            None => exchange.await,
        }
        .map_err(|e| Error::transport(format!("transport task failed: {e}")))??;

        tracing::debug!(status = raw.status, "response received");
        let response = Response {
            status: raw.status,
            status_text: raw.status_text,
            headers: raw.headers,
            data: Value::String(raw.body),
            config,
        };
        settle(response)
    }
}

fn execute(
    agent: &ureq::Agent,
    method: Method,
    url: &str,
    headers: &[(String, String)],
    body: Option<String>,
    timeout: Option<Duration>,
) -> Result<RawResponse> {
    let mut builder = ureq::http::Request::builder()
        .method(method.as_str().to_ascii_uppercase().as_str())
        .uri(url);
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let sent = match body {
        Some(body) => {
            let request = builder
                .body(body)
                .map_err(|e| Error::InvalidUrl(e.to_string()))?;
            let request = agent
                .configure_request(request)
                .timeout_global(timeout)
                .build();
            agent.run(request)
        }
        None => {
            let request = builder
                .body(())
                .map_err(|e| Error::InvalidUrl(e.to_string()))?;
            let request = agent
                .configure_request(request)
                .timeout_global(timeout)
                .build();
            agent.run(request)
        }
    };

    let mut response = sent.map_err(|e| match (e, timeout) {
        (ureq::Error::Timeout(_), Some(limit)) => Error::Timeout(limit),
        (e, _) => Error::transport(e.to_string()),
    })?;

    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect::<Headers>();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| Error::transport(e.to_string()))?;

    Ok(RawResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body,
    })
}
