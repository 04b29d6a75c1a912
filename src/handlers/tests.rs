// ---------------------------------------------------------------------------
// handlers/tests.rs - Unit tests for request decoding helpers
// ---------------------------------------------------------------------------

use axum::http::{HeaderMap, HeaderValue};
use serde_json::json;

use super::public::stream_params;
use super::*;
use crate::models::StreamQuery;

fn query(params: Option<&str>, prompt: Option<&str>) -> StreamQuery {
    StreamQuery {
        method: "code_gen".to_string(),
        params: params.map(str::to_string),
        prompt: prompt.map(str::to_string),
    }
}

#[test]
fn stream_params_default_to_empty_object() {
    assert!(stream_params(&query(None, None)).unwrap().is_empty());
    assert!(stream_params(&query(Some("  "), None)).unwrap().is_empty());
}

#[test]
fn stream_params_merge_prompt() {
    let params = stream_params(&query(Some(r#"{"prompt":"old","n":1}"#), Some("new"))).unwrap();
    assert_eq!(serde_json::Value::Object(params), json!({"prompt": "new", "n": 1}));
}

#[test]
fn stream_params_reject_malformed_and_non_object_json() {
    for raw in ["{not json", "[1,2]", "\"text\""] {
        let err = stream_params(&query(Some(raw), None)).unwrap_err();
        assert!(matches!(&err, GatewayError::BadRequest(m) if m.starts_with("invalid_params: ")), "{raw}");
    }
}

#[test]
fn authorization_reads_header() {
    let mut headers = HeaderMap::new();
    assert_eq!(authorization(&headers), None);
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
    assert_eq!(authorization(&headers), Some("Bearer abc"));
}
