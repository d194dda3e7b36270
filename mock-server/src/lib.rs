//! Echo server for exercising HTTP clients end to end.
//!
//! Routes:
//! - `/echo` and `/echo/{*rest}` (any method): reply 200 with what was received.
//! - `/status/{code}` (any method): reply with that status and a small JSON body.
//! - `/delay/{ms}`: sleep, then reply 200.
//! - `/text`: reply with a plain-text body.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, RawQuery},
    http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// What `/echo` saw of a request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Echo {
    pub id: Uuid,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Client port of the connection, when served with connect info.
    pub peer_port: Option<u16>,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
        .route("/status/{code}", any(status))
        .route("/delay/{ms}", get(delay))
        .route("/text", get(text))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(
        listener,
        app().into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

async fn echo(
    method: Method,
    uri: Uri,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
) -> impl IntoResponse {
    let echo = Echo {
        id: Uuid::new_v4(),
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
        peer_port: extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.port()),
    };
    tracing::debug!(method = %echo.method, path = %echo.path, "echo");

    let mut response_headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&echo.id.to_string()) {
        response_headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    (response_headers, Json(echo))
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, Json(serde_json::json!({ "status": code }))))
}

async fn delay(Path(ms): Path<u64>) -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(serde_json::json!({ "delayed_ms": ms }))
}

async fn text() -> &'static str {
    "hello, world"
}
