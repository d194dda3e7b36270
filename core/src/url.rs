//! URL assembly: query strings from params, and base url joining.

use serde_json::{Map, Value};

use crate::config::ParamsSerializer;

/// Percent-encode a query component, leaving `: $ , [ ]` readable and
/// writing spaces as `+`.
fn encode(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%3A", ":")
        .replace("%24", "$")
        .replace("%2C", ",")
        .replace("%20", "+")
        .replace("%5B", "[")
        .replace("%5D", "]")
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Default params serialization: `null` is skipped, arrays repeat the key
/// as `key[]`, objects are sent as JSON.
pub fn serialize_params(params: &Map<String, Value>) -> String {
    let mut parts = Vec::new();
    for (key, value) in params {
        match value {
            Value::Null => continue,
            Value::Array(items) => {
                let key = format!("{key}[]");
                for item in items.iter().filter(|v| !v.is_null()) {
                    parts.push(format!("{}={}", encode(&key), encode(&scalar(item))));
                }
            }
            other => parts.push(format!("{}={}", encode(key), encode(&scalar(other)))),
        }
    }
    parts.join("&")
}

/// Append `params` to `url`. A fragment on `url` is dropped when a query is
/// added.
pub fn build_url(
    url: &str,
    params: Option<&Map<String, Value>>,
    serializer: Option<&ParamsSerializer>,
) -> String {
    let Some(params) = params else {
        return url.to_string();
    };
    let query = match serializer {
        Some(serialize) => serialize(params),
        None => serialize_params(params),
    };
    if query.is_empty() {
        return url.to_string();
    }
    let base = url.split_once('#').map_or(url, |(before, _)| before);
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

/// True for `scheme://...` and protocol-relative `//...` urls.
pub fn is_absolute_url(url: &str) -> bool {
    if url.starts_with("//") {
        return true;
    }
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Join `base` and `relative` with exactly one slash between them.
pub fn combine_urls(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
