//! The client facade: merges configuration, builds the interceptor chain
//! around `dispatch`, and runs it.
//!
//! # Design
//! `Client` is a cheap handle; clones share the same defaults and
//! interceptor registries. Each request takes a snapshot of both
//! registries, so interceptors added or ejected while a request is in
//! flight only affect requests issued afterwards.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::config::{merge_config, RequestConfig};
use crate::defaults::defaults;
use crate::dispatch::dispatch;
use crate::error::Result;
use crate::http::{Method, Response};
use crate::interceptor::{Interceptor, Interceptors};
use crate::url::build_url;

#[derive(Debug)]
struct Inner {
    defaults: RwLock<RequestConfig>,
    interceptors: Interceptors,
}

/// Issues requests through the interceptor chain.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(RequestConfig::new())
    }
}

/// The per-request sequence of stages: request interceptors in the order
/// they run, then dispatch, then response interceptors.
struct Chain {
    request: Vec<Interceptor<RequestConfig>>,
    response: Vec<Interceptor<Response>>,
}

impl Chain {
    async fn run(self, config: RequestConfig) -> Result<Response> {
        let mut outcome = Ok(config);
        for interceptor in &self.request {
            outcome = interceptor.run(outcome).await;
        }

        let mut outcome = match outcome {
            Ok(config) => dispatch(config).await,
            Err(error) => Err(error),
        };

        for interceptor in &self.response {
            outcome = interceptor.run(outcome).await;
        }
        outcome
    }
}

impl Client {
    /// A client whose defaults are the library defaults overlaid with `config`.
    pub fn new(config: RequestConfig) -> Self {
        Self::from_defaults(merge_config(&defaults(), &config))
    }

    /// A client that uses `config` as its defaults verbatim.
    pub fn from_defaults(config: RequestConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                defaults: RwLock::new(config),
                interceptors: Interceptors::default(),
            }),
        }
    }

    /// A new, independent client built from this one's defaults and `config`.
    /// Interceptors are not carried over.
    pub fn derive(&self, config: RequestConfig) -> Self {
        Self::from_defaults(merge_config(&self.defaults(), &config))
    }

    pub fn defaults(&self) -> RequestConfig {
        self.inner.defaults.read().clone()
    }

    /// Edit a copy of the defaults and store it. No lock is held while
    /// `update` runs, so it may call back into the client. Concurrent
    /// updates are last-writer-wins.
    pub fn update_defaults(&self, update: impl FnOnce(&mut RequestConfig)) {
        let mut defaults = self.defaults();
        update(&mut defaults);
        *self.inner.defaults.write() = defaults;
    }

    pub fn interceptors(&self) -> &Interceptors {
        &self.inner.interceptors
    }

    fn chain(&self) -> Chain {
        let mut request = self.inner.interceptors.request.snapshot();
        request.reverse();
        let response = self.inner.interceptors.response.snapshot();
        tracing::debug!(
            request_interceptors = request.len(),
            response_interceptors = response.len(),
            "built request chain"
        );
        Chain { request, response }
    }

    /// Send a request described by `config`, merged over the client defaults.
    pub async fn request(&self, config: RequestConfig) -> Result<Response> {
        let defaults = self.defaults();
        let mut config = merge_config(&defaults, &config);
        config.method = Some(config.method.or(defaults.method).unwrap_or_default());
        self.chain().run(config).await
    }

    /// `request` with `url` set on `config` first.
    pub async fn request_url(&self, url: &str, mut config: RequestConfig) -> Result<Response> {
        config.url = Some(url.to_string());
        self.request(config).await
    }

    async fn without_body(&self, method: Method, url: &str, config: RequestConfig) -> Result<Response> {
        debug_assert!(!method.carries_body(), "{method} takes a body");
        let sugar = RequestConfig {
            method: Some(method),
            url: Some(url.to_string()),
            data: config.data.clone(),
            ..RequestConfig::default()
        };
        self.request(merge_config(&config, &sugar)).await
    }

    async fn with_body(
        &self,
        method: Method,
        url: &str,
        data: Option<Value>,
        config: RequestConfig,
    ) -> Result<Response> {
        debug_assert!(method.carries_body(), "{method} takes no body");
        let sugar = RequestConfig {
            method: Some(method),
            url: Some(url.to_string()),
            data,
            ..RequestConfig::default()
        };
        self.request(merge_config(&config, &sugar)).await
    }

    pub async fn get(&self, url: &str, config: RequestConfig) -> Result<Response> {
        self.without_body(Method::Get, url, config).await
    }

    pub async fn delete(&self, url: &str, config: RequestConfig) -> Result<Response> {
        self.without_body(Method::Delete, url, config).await
    }

    pub async fn head(&self, url: &str, config: RequestConfig) -> Result<Response> {
        self.without_body(Method::Head, url, config).await
    }

    pub async fn options(&self, url: &str, config: RequestConfig) -> Result<Response> {
        self.without_body(Method::Options, url, config).await
    }

    pub async fn post(
        &self,
        url: &str,
        data: impl Into<Option<Value>>,
        config: RequestConfig,
    ) -> Result<Response> {
        self.with_body(Method::Post, url, data.into(), config).await
    }

    pub async fn put(
        &self,
        url: &str,
        data: impl Into<Option<Value>>,
        config: RequestConfig,
    ) -> Result<Response> {
        self.with_body(Method::Put, url, data.into(), config).await
    }

    pub async fn patch(
        &self,
        url: &str,
        data: impl Into<Option<Value>>,
        config: RequestConfig,
    ) -> Result<Response> {
        self.with_body(Method::Patch, url, data.into(), config).await
    }

    /// The url `config` would request, without sending anything. A `?` left
    /// at the start by an empty url is dropped.
    pub fn get_uri(&self, config: RequestConfig) -> String {
        let config = merge_config(&self.defaults(), &config);
        let uri = build_url(
            config.url.as_deref().unwrap_or_default(),
            config.params.as_ref(),
            config.params_serializer.as_ref(),
        );
        if let Some(rest) = uri.strip_prefix('?') {
            return rest.to_string();
        }
        uri
    }
}
