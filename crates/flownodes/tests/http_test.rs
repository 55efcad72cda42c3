use axum::extract::Path;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use flowcore::{Document, Executor, ExecutorContext, NodeError, Value};
use flownodes::HttpRequestExecutor;
use serde_json::json;
use std::net::SocketAddr;

async fn echo(headers: HeaderMap, Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    Json(json!({
        "body": body,
        "content_type": header("content-type"),
        "token": header("x-token"),
    }))
}

async fn body_length(headers: HeaderMap, body: String) -> Json<serde_json::Value> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({"length": body.len(), "content_type": content_type}))
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/json", get(|| async { Json(json!({"hello": "world"})) }))
        .route("/text", get(|| async { "plain text" }))
        .route("/echo", post(echo))
        .route("/length", post(body_length))
        .route(
            "/users/:id",
            get(|Path(id): Path<String>| async move { Json(json!({"id": id})) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn doc(value: serde_json::Value) -> Document {
    Value::parse_document(&value.to_string()).unwrap()
}

async fn call(config: serde_json::Value, inputs: serde_json::Value) -> Result<Value, NodeError> {
    let ctx = ExecutorContext::new(1, 1)
        .with_config(doc(config))
        .with_inputs(doc(inputs));
    HttpRequestExecutor::new().execute(ctx).await
}

#[tokio::test]
async fn test_get_json_response() {
    let addr = spawn_server().await;

    let output = call(json!({"url": format!("http://{}/json", addr)}), json!({}))
        .await
        .unwrap();

    assert_eq!(
        output,
        Value::from(json!({"status_code": 200, "data": {"hello": "world"}}))
    );
}

#[tokio::test]
async fn test_text_response_is_wrapped() {
    let addr = spawn_server().await;

    let output = call(json!({"url": format!("http://{}/text", addr)}), json!({}))
        .await
        .unwrap();

    assert_eq!(
        output,
        Value::from(json!({"status_code": 200, "data": {"text": "plain text"}}))
    );
}

#[tokio::test]
async fn test_post_sends_json_body_and_headers() {
    let addr = spawn_server().await;

    let output = call(
        json!({
            "url": format!("http://{}/echo", addr),
            "method": "post",
            "headers": {"X-Token": "secret"},
            "json_data": {"name": "flow", "count": 2}
        }),
        json!({}),
    )
    .await
    .unwrap();

    assert_eq!(
        output,
        Value::from(json!({
            "status_code": 200,
            "data": {
                "body": {"name": "flow", "count": 2},
                "content_type": "application/json",
                "token": "secret"
            }
        }))
    );
}

#[tokio::test]
async fn test_post_without_json_data_sends_empty_body() {
    let addr = spawn_server().await;

    let output = call(
        json!({"url": format!("http://{}/length", addr), "method": "POST"}),
        json!({}),
    )
    .await
    .unwrap();

    assert_eq!(
        output,
        Value::from(json!({
            "status_code": 200,
            "data": {"length": 0, "content_type": "application/json"}
        }))
    );
}

#[tokio::test]
async fn test_url_placeholders_use_inputs() {
    let addr = spawn_server().await;

    let output = call(
        json!({"url": format!("http://{}/users/{{{{ user_id }}}}", addr)}),
        json!({"user_id": 42}),
    )
    .await
    .unwrap();

    assert_eq!(
        output,
        Value::from(json!({"status_code": 200, "data": {"id": "42"}}))
    );
}

#[tokio::test]
async fn test_not_found_is_reported_with_status() {
    let addr = spawn_server().await;

    let output = call(json!({"url": format!("http://{}/missing", addr)}), json!({}))
        .await
        .unwrap();

    assert_eq!(output.lookup_path("status_code"), Some(&Value::from(404u16)));
}

#[tokio::test]
async fn test_config_errors() {
    let err = call(json!({}), json!({})).await.unwrap_err();
    assert!(matches!(err, NodeError::Config(ref msg) if msg.contains("url")));

    let err = call(
        json!({"url": "http://127.0.0.1:1/", "method": "NOT A METHOD"}),
        json!({}),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, NodeError::Config(_)));

    let err = call(
        json!({"url": "http://127.0.0.1:1/", "headers": {"bad header": "x"}}),
        json!({}),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, NodeError::Config(_)));
}

#[tokio::test]
async fn test_connection_failure_is_execution_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = call(json!({"url": format!("http://{}/", addr)}), json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Execution(_)));
}
