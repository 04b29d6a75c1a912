// ---------------------------------------------------------------------------
// handlers/public.rs - Unauthenticated, allow-listed tool surface
// ---------------------------------------------------------------------------

use std::convert::Infallible;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderName};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::StreamExt;
use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::models::{ExecuteRequest, ExecuteResponse, MetricsResponse, StreamQuery, ToolDescription};
use crate::params::Params;
use crate::state::AppState;
use crate::streaming;

use super::invalid_body;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

// ── Discovery ────────────────────────────────────────────────────────────────

/// GET /public/health - every registered tool name.
pub async fn public_health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "ok": true, "tools": state.dispatcher.registry().list_names() }))
}

/// GET /public/tools - the allow-list.
pub async fn public_tools(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "tools": state.dispatcher.list_public() }))
}

pub async fn public_describe(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ToolDescription>, GatewayError> {
    Ok(Json(state.dispatcher.describe(&name)?))
}

pub async fn public_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        ok: true,
        metrics: state.dispatcher.latency().snapshot(),
    })
}

// ── Execution ────────────────────────────────────────────────────────────────

pub async fn public_execute(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, GatewayError> {
    let Json(request) = payload.map_err(invalid_body)?;
    Ok(Json(state.dispatcher.execute(&request.method, request.params).await?))
}

/// Parameters for a stream request: the decoded `params` object with
/// `prompt` merged in when given.
pub(crate) fn stream_params(query: &StreamQuery) -> Result<Params, GatewayError> {
    let raw = query.params.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let mut params = match raw {
        None => Params::new(),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(GatewayError::BadRequest(
                    "invalid_params: params must be a JSON object".to_string(),
                ));
            }
            Err(e) => return Err(GatewayError::BadRequest(format!("invalid_params: {e}"))),
        },
    };
    if let Some(prompt) = &query.prompt {
        params.insert("prompt".to_string(), Value::String(prompt.clone()));
    }
    Ok(params)
}

/// GET /public/stream - simulated streaming over SSE.
///
/// Lookup and parameter decoding fail synchronously with a plain error
/// response; everything after that is reported in-band as SSE frames.
pub async fn public_stream(
    State(state): State<AppState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let Query(query) =
        query.map_err(|e| GatewayError::BadRequest(format!("invalid_params: {}", e.body_text())))?;

    let tool = state.dispatcher.resolve_public(&query.method)?;
    let params = stream_params(&query)?;

    tracing::info!(tool = %tool.name(), "public: stream");
    let events = streaming::frames(state.dispatcher.clone(), tool, params)
        .map(|frame| Ok::<_, Infallible>(frame.into_event()));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Sse::new(events).keep_alive(KeepAlive::default()),
    ))
}
