use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceExt;

use luna_mcp::dispatch::{AllowList, Dispatcher};
use luna_mcp::error::ToolError;
use luna_mcp::metrics::LatencyRecorder;
use luna_mcp::params::Params;
use luna_mcp::registry::{Tool, ToolRegistry};
use luna_mcp::state::AppState;

const SECRET: &str = "test-secret";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PromptArgs {
    prompt: String,
}

/// Helper: registry of fake tools covering every outcome class.
fn test_registry() -> ToolRegistry {
    let mut reg = ToolRegistry::new();
    reg.register(Tool::simple("echo", "Echo the prompt", |a: PromptArgs| async move {
        Ok::<_, ToolError>(json!({ "echo": a.prompt, "api_key": "k", "nested": [{ "auth_header": "x", "n": 1 }] }))
    }))
    .unwrap();
    reg.register(Tool::simple("aaa", "Three hundred A's", |_: Params| async {
        Ok::<_, ToolError>("A".repeat(300))
    }))
    .unwrap();
    reg.register(Tool::simple("boom", "Always fails", |_: Params| async {
        Err::<Value, _>(ToolError::failed("internal path /srv/boom leaked"))
    }))
    .unwrap();
    reg.register(Tool::simple("private", "Privileged only", |_: Params| async {
        Ok::<_, ToolError>("ok")
    }))
    .unwrap();
    reg
}

/// Helper: ready state with the fake registry. `ghost` is allow-listed but unregistered.
fn test_state(auth: Option<&str>) -> AppState {
    let dispatcher = Dispatcher::new(
        test_registry(),
        AllowList::new(["echo", "aaa", "boom", "ghost"]),
        LatencyRecorder::new(50),
        auth.map(str::to_string),
    );
    let state = AppState::new(Arc::new(dispatcher), false);
    state.mark_ready();
    state
}

fn app(state: AppState) -> axum::Router {
    luna_mcp::create_router(state)
}

/// Helper: collect a response body into a serde_json::Value.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, auth: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bearer() -> String {
    format!("Bearer {SECRET}")
}

/// Split an SSE body into `(event, data)` pairs, skipping comments.
fn sse_frames(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    event = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = serde_json::from_str::<Value>(v.trim()).ok();
                }
            }
            Some((event?, data?))
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
//  POST /mcp
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn mcp_rejects_missing_token() {
    let response = app(test_state(Some(SECRET)))
        .oneshot(post_json("/mcp", None, r#"{"method":"echo","params":{"prompt":"x"}}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("x-request-id"));
    let json = body_json(response).await;
    assert_eq!(json["statusCode"], 401);
    assert_eq!(json["detail"], "invalid token");
}

#[tokio::test]
async fn mcp_rejects_wrong_token() {
    let response = app(test_state(Some(SECRET)))
        .oneshot(post_json("/mcp", Some("Bearer nope"), r#"{"method":"echo"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mcp_without_configured_secret_is_500() {
    let response = app(test_state(None))
        .oneshot(post_json("/mcp", Some("Bearer anything"), r#"{"method":"echo"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Server not configured with AUTH_TOKEN");
}

#[tokio::test]
async fn mcp_success_echoes_id_and_returns_raw_result() {
    let response = app(test_state(Some(SECRET)))
        .oneshot(post_json(
            "/mcp",
            Some(&bearer()),
            r#"{"method":"echo","params":{"prompt":"hi"},"id":"req-1"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["protocolVersion"], "2.0");
    assert_eq!(json["id"], "req-1");
    assert_eq!(json["result"]["echo"], "hi");
    assert_eq!(json["result"]["api_key"], "k");
}

#[tokio::test]
async fn mcp_unknown_tool_is_404() {
    let response = app(test_state(Some(SECRET)))
        .oneshot(post_json("/mcp", Some(&bearer()), r#"{"method":"nope","id":1}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["detail"], "tool_not_found");
}

#[tokio::test]
async fn mcp_parameter_mismatch_names_the_parameter() {
    let response = app(test_state(Some(SECRET)))
        .oneshot(post_json("/mcp", Some(&bearer()), r#"{"method":"echo","params":{"text":"x"}}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let detail = body_json(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("parameter error"), "{detail}");
    assert!(detail.contains("text"), "{detail}");
}

#[tokio::test]
async fn mcp_tool_failure_is_500_with_detail() {
    let response = app(test_state(Some(SECRET)))
        .oneshot(post_json("/mcp", Some(&bearer()), r#"{"method":"boom"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["detail"].as_str().unwrap().contains("/srv/boom"));
}

#[tokio::test]
async fn mcp_malformed_body_checks_auth_first() {
    let response = app(test_state(Some(SECRET)))
        .oneshot(post_json("/mcp", None, "{broken"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app(test_state(Some(SECRET)))
        .oneshot(post_json("/mcp", Some(&bearer()), "{broken"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mcp_discovery_lists_public_tools() {
    let response = app(test_state(Some(SECRET))).oneshot(get("/mcp")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(
        json,
        json!({
            "ok": true,
            "endpoint": "/mcp",
            "protocol": "jsonrpc-2.0",
            "methods": ["POST"],
            "publicTools": ["aaa", "boom", "echo", "ghost"],
        })
    );
}

// ═══════════════════════════════════════════════════════════════════════════
//  Public surface
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn public_health_and_tools() {
    let state = test_state(Some(SECRET));

    let json = body_json(app(state.clone()).oneshot(get("/public/health")).await.unwrap()).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["tools"], json!(["aaa", "boom", "echo", "private"]));

    let json = body_json(app(state).oneshot(get("/public/tools")).await.unwrap()).await;
    assert_eq!(json, json!({ "tools": ["aaa", "boom", "echo", "ghost"] }));
}

#[tokio::test]
async fn public_describe_orders_forbidden_before_not_found() {
    let state = test_state(Some(SECRET));

    let response = app(state.clone()).oneshot(get("/public/describe/private")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["detail"], "tool_not_public");

    let response = app(state.clone()).oneshot(get("/public/describe/ghost")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app(state).oneshot(get("/public/describe/echo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "tool": "echo", "description": "Echo the prompt" })
    );
}

#[tokio::test]
async fn public_execute_sanitizes_result() {
    let response = app(test_state(None))
        .oneshot(post_json(
            "/public/execute",
            None,
            r#"{"method":"echo","params":{"prompt":"hi"}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "method": "echo", "result": { "echo": "hi", "nested": [{ "n": 1 }] } })
    );
}

#[tokio::test]
async fn public_execute_error_classes() {
    let state = test_state(None);
    let cases = [
        (r#"{"method":"private"}"#, StatusCode::FORBIDDEN, "tool_not_public"),
        (r#"{"method":"ghost"}"#, StatusCode::NOT_FOUND, "tool_not_found"),
        (r#"{"method":"boom"}"#, StatusCode::INTERNAL_SERVER_ERROR, "tool_execution_failed"),
    ];
    for (body, status, detail) in cases {
        let response = app(state.clone())
            .oneshot(post_json("/public/execute", None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), status, "{body}");
        assert_eq!(body_json(response).await["detail"], detail, "{body}");
    }

    let response = app(state)
        .oneshot(post_json("/public/execute", None, r#"{"method":"echo","params":{}}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let detail = body_json(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("parameter_error: "), "{detail}");
    assert!(detail.contains("prompt"), "{detail}");
}

#[tokio::test]
async fn public_stream_rechunks_long_results() {
    let response = app(test_state(None)).oneshot(get("/public/stream?method=aaa")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/event-stream"));
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-transform");
    assert_eq!(headers["x-accel-buffering"], "no");

    let frames = sse_frames(&body_text(response).await);
    assert_eq!(frames.len(), 5);
    assert_eq!(frames[0], ("start".to_string(), json!({ "method": "aaa" })));
    for (i, (offset, len)) in [(0, 120), (120, 120), (240, 60)].into_iter().enumerate() {
        let (event, data) = &frames[i + 1];
        assert_eq!(event, "data");
        assert_eq!(data["offset"], offset);
        assert_eq!(data["chunk"].as_str().unwrap().len(), len);
    }
    assert_eq!(frames[4], ("end".to_string(), json!({ "ok": true })));
}

#[tokio::test]
async fn public_stream_merges_prompt_and_sanitizes() {
    let response = app(test_state(None))
        .oneshot(get("/public/stream?method=echo&prompt=hello%20there"))
        .await
        .unwrap();
    let frames = sse_frames(&body_text(response).await);
    let text: String = frames
        .iter()
        .filter(|(e, d)| e == "data" && d.get("offset").is_some())
        .map(|(_, d)| d["chunk"].as_str().unwrap().to_string())
        .collect();
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, json!({ "echo": "hello there", "nested": [{ "n": 1 }] }));
    assert_eq!(frames.last().unwrap().0, "end");
}

#[tokio::test]
async fn public_stream_reports_failures_in_band() {
    let response = app(test_state(None)).oneshot(get("/public/stream?method=echo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let frames = sse_frames(&body_text(response).await);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].0, "error");
    assert!(frames[1].1["detail"].as_str().unwrap().starts_with("parameter error"));

    let response = app(test_state(None)).oneshot(get("/public/stream?method=boom")).await.unwrap();
    let frames = sse_frames(&body_text(response).await);
    assert_eq!(frames.last().unwrap().0, "error");
    assert!(!frames.iter().any(|(e, _)| e == "end"));
}

#[tokio::test]
async fn public_stream_rejects_synchronously() {
    let state = test_state(None);

    let response = app(state.clone()).oneshot(get("/public/stream?method=private")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(state.clone()).oneshot(get("/public/stream?method=ghost")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app(state)
        .oneshot(get("/public/stream?method=echo&params=%5B1%2C2%5D"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["detail"].as_str().unwrap().starts_with("invalid_params: "));
}

#[tokio::test]
async fn public_metrics_reflect_successful_calls_only() {
    let state = test_state(Some(SECRET));

    let json = body_json(app(state.clone()).oneshot(get("/public/metrics")).await.unwrap()).await;
    assert_eq!(json, json!({ "ok": true, "metrics": {} }));

    for _ in 0..2 {
        app(state.clone())
            .oneshot(post_json("/public/execute", None, r#"{"method":"echo","params":{"prompt":"x"}}"#))
            .await
            .unwrap();
    }
    app(state.clone())
        .oneshot(post_json("/public/execute", None, r#"{"method":"boom"}"#))
        .await
        .unwrap();

    let json = body_json(app(state).oneshot(get("/public/metrics")).await.unwrap()).await;
    assert_eq!(json["metrics"]["echo"]["count"], 2);
    assert!(json["metrics"]["echo"]["avg_ms"].is_number());
    assert!(json["metrics"]["echo"]["p95_ms"].is_number());
    assert!(json["metrics"].get("boom").is_none());
}
