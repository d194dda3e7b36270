//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then sends every kind of
//! request through `Client` with the default `UreqAdapter`, so the whole
//! pipeline (merge, interceptors, transforms, header flattening, transport,
//! settle) runs over real HTTP.

use std::time::{Duration, Instant};

use hookline_core::{CancelToken, Client, Error, Method, RequestConfig, Response};
use mock_server::REQUEST_ID_HEADER;
use serde_json::{json, Value};

/// Start the mock server on a random port and return its base url.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client() -> Client {
    Client::new(RequestConfig::new().with_base_url(start_server()))
}

#[tokio::test]
async fn get_sends_params_and_flattened_headers() {
    let client = client();
    let response = client
        .get(
            "/echo",
            RequestConfig::new()
                .with_param("page", 2)
                .with_param("q", "rust lang")
                .with_header("x-trace", "abc"),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.status_text, "OK");
    assert_eq!(response.data["method"], "GET");
    assert_eq!(response.data["query"], "page=2&q=rust+lang");
    assert_eq!(response.data["headers"]["x-trace"], "abc");
    assert_eq!(
        response.data["headers"]["accept"],
        "application/json, text/plain, */*"
    );
    assert!(response.data["headers"].get("common").is_none());
    assert_eq!(response.config.method, Some(Method::Get));
}

#[tokio::test]
async fn post_serializes_json_body() {
    let client = client();
    let response = client
        .post("/echo/items", json!({"title": "Buy milk"}), RequestConfig::new())
        .await
        .unwrap();

    assert_eq!(response.data["method"], "POST");
    assert_eq!(response.data["path"], "/echo/items");
    assert_eq!(response.data["body"], r#"{"title":"Buy milk"}"#);
    assert_eq!(
        response.data["headers"]["content-type"],
        "application/json;charset=utf-8"
    );
}

#[tokio::test]
async fn string_body_keeps_method_scoped_content_type() {
    let client = client();
    let response = client
        .put("/echo", json!("a=1&b=2"), RequestConfig::new())
        .await
        .unwrap();
    assert_eq!(response.data["method"], "PUT");
    assert_eq!(response.data["body"], "a=1&b=2");
    assert_eq!(
        response.data["headers"]["content-type"],
        "application/x-www-form-urlencoded"
    );
}

#[tokio::test]
async fn every_shortcut_uses_its_method() {
    let client = client();
    let config = RequestConfig::new;
    let methods = [
        client.get("/echo", config()).await,
        client.delete("/echo", config()).await,
        client.options("/echo", config()).await,
        client.post("/echo", Value::Null, config()).await,
        client.put("/echo", Value::Null, config()).await,
        client.patch("/echo", json!({"done": true}), config()).await,
    ]
    .into_iter()
    .map(|r| r.unwrap().data["method"].as_str().unwrap().to_string())
    .collect::<Vec<_>>();
    assert_eq!(methods, ["GET", "DELETE", "OPTIONS", "POST", "PUT", "PATCH"]);

    let head = client.head("/echo", config()).await.unwrap();
    assert_eq!(head.status, 200);
}

#[tokio::test]
async fn sequential_requests_reuse_the_pooled_connection() {
    let client = client();
    let first = client.get("/echo", RequestConfig::new()).await.unwrap();
    let second = client.get("/echo", RequestConfig::new()).await.unwrap();
    assert!(first.data["peer_port"].is_u64(), "{:?}", first.data);
    assert_eq!(first.data["peer_port"], second.data["peer_port"]);
}

#[tokio::test]
async fn non_2xx_rejects_with_transformed_response() {
    let client = client();
    let err = client.get("/status/404", RequestConfig::new()).await.unwrap_err();
    match &err {
        Error::Status(response) => {
            assert_eq!(response.status, 404);
            assert_eq!(response.data, json!({"status": 404}));
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert_eq!(err.to_string(), "request failed with status code 404");
}

#[tokio::test]
async fn custom_validate_status_accepts_errors() {
    let client = client();
    let response = client
        .get(
            "/status/500",
            RequestConfig::new().with_validate_status(|_| true),
        )
        .await
        .unwrap();
    assert_eq!(response.status, 500);
    assert_eq!(response.data["status"], 500);
}

#[tokio::test]
async fn plain_text_body_is_left_as_string() {
    let client = client();
    let response = client.get("/text", RequestConfig::new()).await.unwrap();
    assert_eq!(response.data, json!("hello, world"));
}

#[tokio::test]
async fn cancel_mid_flight_settles_promptly() {
    let client = client();
    let token = CancelToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel(Some("user gave up"));
    });

    let started = Instant::now();
    let err = client
        .get("/delay/3000", RequestConfig::new().with_cancel_token(token))
        .await
        .unwrap_err();
    assert!(err.is_cancel(), "expected cancellation, got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn cancelled_before_request_never_connects() {
    let client = Client::new(RequestConfig::new().with_base_url("http://127.0.0.1:9"));
    let token = CancelToken::new();
    token.cancel(None);
    let err = client
        .get("/echo", RequestConfig::new().with_cancel_token(token))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled(_)));
}

#[tokio::test]
async fn timeout_surfaces_as_timeout_error() {
    let client = client();
    let err = client
        .get(
            "/delay/3000",
            RequestConfig::new().with_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(d) if d == Duration::from_millis(100)), "{err:?}");
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = Client::new(RequestConfig::new().with_base_url(format!("http://127.0.0.1:{port}")));
    let err = client.get("/echo", RequestConfig::new()).await.unwrap_err();
    assert!(matches!(err, Error::Transport { response: None, .. }), "{err:?}");
}

#[tokio::test]
async fn interceptors_wrap_real_requests() {
    let client = client();
    client
        .interceptors()
        .request
        .add(|config: RequestConfig| async move { Ok(config.with_header("authorization", "Bearer secret")) });
    client.interceptors().response.add(|mut response: Response| async move {
        let id = response.headers.get(REQUEST_ID_HEADER).unwrap_or_default().to_string();
        response.data["seen_request_id"] = json!(id);
        Ok(response)
    });

    let response = client.get("/echo", RequestConfig::new()).await.unwrap();
    assert_eq!(response.data["headers"]["authorization"], "Bearer secret");
    assert_eq!(response.data["seen_request_id"], response.data["id"]);
}

#[test]
fn get_uri_does_not_touch_the_network() {
    let client = Client::new(RequestConfig::new().with_base_url("http://127.0.0.1:9"));
    assert_eq!(
        client.get_uri(RequestConfig::new().with_url("/x").with_param("a", 1)),
        "/x?a=1"
    );
}
