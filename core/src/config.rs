//! Request configuration and the merge that layers per-call options over
//! instance defaults.
//!
//! # Design
//! Every field is optional so a merge can tell "not set" from "set to
//! something". How each key combines is looked up in `MERGE_STRATEGIES`
//! instead of being decided per field in code; adding a key means adding a
//! row there and a match arm in `merge_key`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use crate::adapter::Adapter;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::http::{Headers, Method};

type SyncTransformFn = dyn Fn(Value, &mut Headers) -> Result<Value> + Send + Sync;
type AsyncTransformFn =
    dyn Fn(Value, Headers) -> BoxFuture<'static, Result<(Value, Headers)>> + Send + Sync;

#[derive(Clone)]
enum TransformFn {
    Immediate(Arc<SyncTransformFn>),
    Suspending(Arc<AsyncTransformFn>),
}

/// One step of a request or response body transformation.
#[derive(Clone)]
pub struct Transform(TransformFn);

impl Transform {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value, &mut Headers) -> Result<Value> + Send + Sync + 'static,
    {
        Self(TransformFn::Immediate(Arc::new(f)))
    }

    /// A transform that may suspend. It owns the headers while it runs and
    /// hands them back alongside the new body.
    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, Headers) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(Value, Headers)>> + Send + 'static,
    {
        Self(TransformFn::Suspending(Arc::new(move |data, headers| {
            f(data, headers).boxed()
        })))
    }

    pub async fn apply(&self, data: Value, headers: &mut Headers) -> Result<Value> {
        match &self.0 {
            TransformFn::Immediate(f) => f(data, headers),
            TransformFn::Suspending(f) => {
                let (data, returned) = f(data, std::mem::take(headers)).await?;
                *headers = returned;
                Ok(data)
            }
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            TransformFn::Immediate(_) => f.write_str("Transform"),
            TransformFn::Suspending(_) => f.write_str("Transform(async)"),
        }
    }
}

/// Thread `data` through `transforms` left to right, awaiting each in turn.
pub async fn transform_data(
    mut data: Value,
    headers: &mut Headers,
    transforms: &[Transform],
) -> Result<Value> {
    for transform in transforms {
        tracing::trace!("applying transform");
        data = transform.apply(data, headers).await?;
    }
    Ok(data)
}

pub type ParamsSerializer = Arc<dyn Fn(&Map<String, Value>) -> String + Send + Sync>;
pub type StatusValidator = Arc<dyn Fn(u16) -> bool + Send + Sync>;

/// Options for a single request, or the defaults of a `Client`.
#[derive(Clone, Default)]
pub struct RequestConfig {
    pub url: Option<String>,
    pub base_url: Option<String>,
    pub method: Option<Method>,
    pub headers: Headers,
    pub params: Option<Map<String, Value>>,
    pub params_serializer: Option<ParamsSerializer>,
    pub data: Option<Value>,
    pub transform_request: Option<Vec<Transform>>,
    pub transform_response: Option<Vec<Transform>>,
    pub adapter: Option<Arc<dyn Adapter>>,
    pub cancel_token: Option<CancelToken>,
    pub timeout: Option<Duration>,
    pub validate_status: Option<StatusValidator>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    /// Set one query parameter, keeping any others already present.
    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(name.to_string(), value.into());
        self
    }

    pub fn with_params_serializer<F>(mut self, f: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> String + Send + Sync + 'static,
    {
        self.params_serializer = Some(Arc::new(f));
        self
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_transform_request(mut self, transforms: Vec<Transform>) -> Self {
        self.transform_request = Some(transforms);
        self
    }

    pub fn with_transform_response(mut self, transforms: Vec<Transform>) -> Self {
        self.transform_response = Some(transforms);
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_validate_status<F>(mut self, f: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.validate_status = Some(Arc::new(f));
        self
    }

    /// Fail with `Error::Cancelled` if this request's token has been cancelled.
    pub fn throw_if_cancellation_requested(&self) -> Result<()> {
        match &self.cancel_token {
            Some(token) => token.throw_if_requested(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("url", &self.url)
            .field("base_url", &self.base_url)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("data", &self.data)
            .field(
                "transform_request",
                &self.transform_request.as_ref().map(Vec::len),
            )
            .field(
                "transform_response",
                &self.transform_response.as_ref().map(Vec::len),
            )
            .field("adapter", &self.adapter.is_some())
            .field("cancel_token", &self.cancel_token)
            .field("timeout", &self.timeout)
            .field("validate_status", &self.validate_status.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Url,
    BaseUrl,
    Method,
    Headers,
    Params,
    ParamsSerializer,
    Data,
    TransformRequest,
    TransformResponse,
    Adapter,
    CancelToken,
    Timeout,
    ValidateStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Taken from the override only; the base value is never inherited.
    OverrideOnly,
    /// Override if set, otherwise the base value.
    Override,
    /// Both sides merged key by key, override winning on collision.
    DeepMerge,
}

pub const MERGE_STRATEGIES: &[(ConfigKey, MergeStrategy)] = &[
    (ConfigKey::Url, MergeStrategy::OverrideOnly),
    (ConfigKey::Method, MergeStrategy::OverrideOnly),
    (ConfigKey::Data, MergeStrategy::OverrideOnly),
    (ConfigKey::Headers, MergeStrategy::DeepMerge),
    (ConfigKey::Params, MergeStrategy::DeepMerge),
    (ConfigKey::BaseUrl, MergeStrategy::Override),
    (ConfigKey::ParamsSerializer, MergeStrategy::Override),
    (ConfigKey::TransformRequest, MergeStrategy::Override),
    (ConfigKey::TransformResponse, MergeStrategy::Override),
    (ConfigKey::Adapter, MergeStrategy::Override),
    (ConfigKey::CancelToken, MergeStrategy::Override),
    (ConfigKey::Timeout, MergeStrategy::Override),
    (ConfigKey::ValidateStatus, MergeStrategy::Override),
];

/// Layer `over` on top of `base`. Neither input is modified.
pub fn merge_config(base: &RequestConfig, over: &RequestConfig) -> RequestConfig {
    let mut merged = RequestConfig::default();
    for &(key, strategy) in MERGE_STRATEGIES {
        merge_key(&mut merged, base, over, key, strategy);
    }
    merged
}

fn merge_key(
    merged: &mut RequestConfig,
    base: &RequestConfig,
    over: &RequestConfig,
    key: ConfigKey,
    strategy: MergeStrategy,
) {
    fn pick<T: Clone>(base: &Option<T>, over: &Option<T>, strategy: MergeStrategy) -> Option<T> {
        match strategy {
            MergeStrategy::OverrideOnly => over.clone(),
            MergeStrategy::Override | MergeStrategy::DeepMerge => {
                over.clone().or_else(|| base.clone())
            }
        }
    }

    match key {
        ConfigKey::Url => merged.url = pick(&base.url, &over.url, strategy),
        ConfigKey::BaseUrl => merged.base_url = pick(&base.base_url, &over.base_url, strategy),
        ConfigKey::Method => merged.method = pick(&base.method, &over.method, strategy),
        ConfigKey::Data => merged.data = pick(&base.data, &over.data, strategy),
        ConfigKey::Headers => {
            merged.headers = match strategy {
                MergeStrategy::DeepMerge => base.headers.merge(&over.headers),
                MergeStrategy::OverrideOnly => over.headers.clone(),
                MergeStrategy::Override if over.headers.is_empty() && over.headers.is_flat() => {
                    base.headers.clone()
                }
                MergeStrategy::Override => over.headers.clone(),
            }
        }
        ConfigKey::Params => {
            merged.params = match (strategy, &base.params, &over.params) {
                (MergeStrategy::DeepMerge, Some(b), Some(o)) => Some(deep_merge(b, o)),
                _ => pick(&base.params, &over.params, strategy),
            }
        }
        ConfigKey::ParamsSerializer => {
            merged.params_serializer =
                pick(&base.params_serializer, &over.params_serializer, strategy)
        }
        ConfigKey::TransformRequest => {
            merged.transform_request =
                pick(&base.transform_request, &over.transform_request, strategy)
        }
        ConfigKey::TransformResponse => {
            merged.transform_response =
                pick(&base.transform_response, &over.transform_response, strategy)
        }
        ConfigKey::Adapter => merged.adapter = pick(&base.adapter, &over.adapter, strategy),
        ConfigKey::CancelToken => {
            merged.cancel_token = pick(&base.cancel_token, &over.cancel_token, strategy)
        }
        ConfigKey::Timeout => merged.timeout = pick(&base.timeout, &over.timeout, strategy),
        ConfigKey::ValidateStatus => {
            merged.validate_status = pick(&base.validate_status, &over.validate_status, strategy)
        }
    }
}

fn deep_merge(base: &Map<String, Value>, over: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in over {
        let next = match (merged.get(key), value) {
            (Some(Value::Object(b)), Value::Object(o)) => Value::Object(deep_merge(b, o)),
            _ => value.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn url_method_and_data_never_inherit_from_base() {
        let base = RequestConfig::new()
            .with_url("/base")
            .with_method(Method::Put)
            .with_data(json!({"a": 1}));
        let merged = merge_config(&base, &RequestConfig::new());
        assert!(merged.url.is_none());
        assert!(merged.method.is_none());
        assert!(merged.data.is_none());
    }

    #[test]
    fn override_keys_fall_back_to_base() {
        let base = RequestConfig::new()
            .with_base_url("http://api")
            .with_timeout(Duration::from_secs(5));
        let over = RequestConfig::new().with_timeout(Duration::from_secs(1));
        let merged = merge_config(&base, &over);
        assert_eq!(merged.base_url.as_deref(), Some("http://api"));
        assert_eq!(merged.timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn headers_deep_merge() {
        let base = RequestConfig::new().with_headers(
            Headers::new()
                .with_common("accept", "json")
                .with("x-a", "1"),
        );
        let over = RequestConfig::new().with_header("x-b", "2");
        let merged = merge_config(&base, &over);
        assert_eq!(merged.headers.get("x-a"), Some("1"));
        assert_eq!(merged.headers.get("x-b"), Some("2"));
        assert_eq!(
            merged.headers.common().get("accept").map(String::as_str),
            Some("json")
        );
    }

    #[test]
    fn params_deep_merge_nested_objects() {
        let base = RequestConfig::new().with_params(params(json!({"page": 1, "filter": {"a": 1}})));
        let over = RequestConfig::new().with_params(params(json!({"filter": {"b": 2}})));
        let merged = merge_config(&base, &over);
        assert_eq!(
            Value::Object(merged.params.unwrap()),
            json!({"page": 1, "filter": {"a": 1, "b": 2}})
        );
    }

    #[test]
    fn merge_leaves_inputs_untouched() {
        let base = RequestConfig::new().with_header("x-a", "1");
        let over = RequestConfig::new().with_header("x-a", "2");
        let merged = merge_config(&base, &over);
        assert_eq!(merged.headers.get("x-a"), Some("2"));
        assert_eq!(base.headers.get("x-a"), Some("1"));
        assert_eq!(over.headers.get("x-a"), Some("2"));
    }

    #[test]
    fn nested_merge_matches_direct_options() {
        let defaults = RequestConfig::new().with_header("x-default", "d");
        let caller = RequestConfig::new().with_header("h", "v").with_url("/ignored");
        let sugar = RequestConfig::new()
            .with_method(Method::Post)
            .with_url("/x")
            .with_data(json!({"n": 1}));
        let via_sugar = merge_config(&defaults, &merge_config(&caller, &sugar));

        let direct = RequestConfig::new()
            .with_method(Method::Post)
            .with_url("/x")
            .with_data(json!({"n": 1}))
            .with_header("h", "v");
        let via_direct = merge_config(&defaults, &direct);

        assert_eq!(via_sugar.url, via_direct.url);
        assert_eq!(via_sugar.method, via_direct.method);
        assert_eq!(via_sugar.data, via_direct.data);
        assert_eq!(via_sugar.headers, via_direct.headers);
    }

    #[test]
    fn every_key_has_a_strategy() {
        let keys = [
            ConfigKey::Url,
            ConfigKey::BaseUrl,
            ConfigKey::Method,
            ConfigKey::Headers,
            ConfigKey::Params,
            ConfigKey::ParamsSerializer,
            ConfigKey::Data,
            ConfigKey::TransformRequest,
            ConfigKey::TransformResponse,
            ConfigKey::Adapter,
            ConfigKey::CancelToken,
            ConfigKey::Timeout,
            ConfigKey::ValidateStatus,
        ];
        for key in keys {
            assert_eq!(
                MERGE_STRATEGIES.iter().filter(|(k, _)| *k == key).count(),
                1,
                "{key:?}"
            );
        }
    }

    #[tokio::test]
    async fn transform_data_threads_left_to_right() {
        let transforms = vec![
            Transform::new(|data, _| Ok(json!([data, "first"]))),
            Transform::new(|data, headers| {
                headers.insert("x-seen", "yes");
                Ok(json!([data, "second"]))
            }),
        ];
        let mut headers = Headers::new();
        let out = transform_data(json!("in"), &mut headers, &transforms).await.unwrap();
        assert_eq!(out, json!([["in", "first"], "second"]));
        assert_eq!(headers.get("x-seen"), Some("yes"));
    }

    #[tokio::test]
    async fn async_transform_sees_and_returns_headers() {
        let transforms = vec![
            Transform::new(|data, headers| {
                headers.insert("x-first", "1");
                Ok(data)
            }),
            Transform::new_async(|data, mut headers: Headers| async move {
                tokio::task::yield_now().await;
                let seen = headers.get("x-first").unwrap_or_default().to_string();
                headers.insert("x-second", "2");
                Ok((json!({"body": data, "seen": seen}), headers))
            }),
        ];
        let mut headers = Headers::new();
        let out = transform_data(json!("in"), &mut headers, &transforms).await.unwrap();
        assert_eq!(out, json!({"body": "in", "seen": "1"}));
        assert_eq!(headers.get("x-first"), Some("1"));
        assert_eq!(headers.get("x-second"), Some("2"));
    }

    #[tokio::test]
    async fn empty_transforms_are_identity() {
        let mut headers = Headers::new();
        let out = transform_data(json!({"k": 1}), &mut headers, &[]).await.unwrap();
        assert_eq!(out, json!({"k": 1}));
    }
}
