//! HTTP value types shared by the pipeline and its adapters.
//!
//! # Design
//! `Headers` keeps the three layers a configured header set can carry:
//! values shared by every method (`common`), values scoped to one method,
//! and plain values. The dispatcher collapses them with `flatten` right
//! before the adapter runs, so adapters only ever see plain values.
//! Header names are stored lower-cased.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RequestConfig;
use crate::error::Error;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Get,
    Delete,
    Head,
    Options,
    Post,
    Put,
    Patch,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Delete,
        Method::Head,
        Method::Options,
        Method::Post,
        Method::Put,
        Method::Patch,
    ];

    /// Lower-case name, which is also the key of the method's header layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Delete => "delete",
            Method::Head => "head",
            Method::Options => "options",
            Method::Post => "post",
            Method::Put => "put",
            Method::Patch => "patch",
        }
    }

    /// Whether the shortcut for this method takes a request body.
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| Error::InvalidMethod(s.to_string()))
    }
}

/// A configured header set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    common: BTreeMap<String, String>,
    per_method: BTreeMap<Method, BTreeMap<String, String>>,
    values: BTreeMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn with_common(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert_common(name, value);
        self
    }

    pub fn with_method(mut self, method: Method, name: &str, value: impl Into<String>) -> Self {
        self.insert_for(method, name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        self.values.insert(name.to_ascii_lowercase(), value.into())
    }

    pub fn insert_common(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        self.common.insert(name.to_ascii_lowercase(), value.into())
    }

    pub fn insert_for(
        &mut self,
        method: Method,
        name: &str,
        value: impl Into<String>,
    ) -> Option<String> {
        self.per_method
            .entry(method)
            .or_default()
            .insert(name.to_ascii_lowercase(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(&name.to_ascii_lowercase())
    }

    pub fn common(&self) -> &BTreeMap<String, String> {
        &self.common
    }

    pub fn for_method(&self, method: Method) -> Option<&BTreeMap<String, String>> {
        self.per_method.get(&method)
    }

    /// Plain values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when no `common` or per-method layer is left.
    pub fn is_flat(&self) -> bool {
        self.common.is_empty() && self.per_method.is_empty()
    }

    /// Deep merge: every layer of `other` is laid over the same layer of `self`.
    pub fn merge(&self, other: &Headers) -> Headers {
        let mut merged = self.clone();
        merged.common.extend(other.common.clone());
        for (method, values) in &other.per_method {
            merged
                .per_method
                .entry(*method)
                .or_default()
                .extend(values.clone());
        }
        merged.values.extend(other.values.clone());
        merged
    }

    /// Collapse `common`, the layer for `method`, and the plain values (later
    /// wins) into a flat set. Every method layer is dropped, present or not.
    pub fn flatten(&self, method: Method) -> Headers {
        let mut values = self.common.clone();
        if let Some(scoped) = self.per_method.get(&method) {
            values.extend(scoped.clone());
        }
        values.extend(self.values.clone());
        Headers {
            values,
            ..Headers::default()
        }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Headers {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// A settled HTTP exchange.
///
/// Built by the adapter, then handed through the response transforms and
/// response interceptors. `data` is replaced in place by the transforms;
/// everything else travels through unchanged.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub data: Value,
    pub config: RequestConfig,
}

impl Response {
    pub fn new(status: u16, headers: Headers, data: Value) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers,
            data,
            config: RequestConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }
}
