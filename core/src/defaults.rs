//! Library defaults every `Client::new` starts from.

use serde_json::Value;

use crate::config::{RequestConfig, Transform};
use crate::error::Result;
use crate::http::{Headers, Method};

pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Serialize objects and arrays to a JSON string and mark the body as JSON.
/// Strings and `null` pass through untouched.
pub fn json_request(data: Value, headers: &mut Headers) -> Result<Value> {
    match data {
        Value::Object(_) | Value::Array(_) => {
            headers.insert("content-type", JSON_CONTENT_TYPE);
            Ok(Value::String(serde_json::to_string(&data)?))
        }
        other => Ok(other),
    }
}

/// Parse string bodies that hold JSON; anything else is returned as is.
pub fn json_response(data: Value, _headers: &mut Headers) -> Result<Value> {
    match data {
        Value::String(text) => match serde_json::from_str(&text) {
            Ok(parsed) => Ok(parsed),
            Err(_) => Ok(Value::String(text)),
        },
        other => Ok(other),
    }
}

pub fn defaults() -> RequestConfig {
    let mut headers = Headers::new().with_common("accept", DEFAULT_ACCEPT);
    for method in [Method::Post, Method::Put, Method::Patch] {
        headers.insert_for(method, "content-type", FORM_CONTENT_TYPE);
    }
    RequestConfig::new()
        .with_headers(headers)
        .with_transform_request(vec![Transform::new(json_request)])
        .with_transform_response(vec![Transform::new(json_response)])
        .with_validate_status(|status| (200..300).contains(&status))
}
