// ---------------------------------------------------------------------------
// error.rs - Tool-layer and protocol-layer error types
// ---------------------------------------------------------------------------

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

/// Failure reported by the upstream-call helper (`upstream::UpstreamClient`).
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    #[error("Upstream {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Invalid JSON from upstream")]
    BadBody,
}

/// Error returned by a tool body (or by binding its parameters).
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The flat parameter map did not fit the tool's argument struct.
    #[error("{0}")]
    Params(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A subprocess exceeded its budget and was killed.
    #[error("Command timed out after {secs}s: {command}")]
    Timeout { command: String, secs: u64 },

    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn failed(msg: impl Into<String>) -> Self {
        ToolError::Failed(msg.into())
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

/// Errors surfaced at the HTTP boundary.
///
/// Response format:
/// ```json
/// { "statusCode": 404, "detail": "tool_not_found" }
/// ```
/// The full error is logged server-side together with a request id that is
/// also returned in the `x-request-id` header.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Server not configured with AUTH_TOKEN")]
    Unconfigured,

    #[error("invalid token")]
    Unauthorized,

    #[error("tool_not_found")]
    NotFound,

    #[error("tool_not_public")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

/// Opaque detail returned for every public-path tool failure.
pub const TOOL_EXECUTION_FAILED: &str = "tool_execution_failed";

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Privileged-path classification: detail text is passed through.
    pub fn from_tool(err: ToolError) -> Self {
        match err {
            ToolError::Params(m) => GatewayError::BadRequest(format!("parameter error: {m}")),
            ToolError::Upstream(e) => GatewayError::Upstream(e.to_string()),
            e @ ToolError::Timeout { .. } => GatewayError::Timeout(e.to_string()),
            ToolError::Failed(m) => GatewayError::Internal(m),
        }
    }

    /// Public-path classification: only binding errors keep their detail,
    /// everything else collapses to [`TOOL_EXECUTION_FAILED`].
    pub fn redacted(tool: &str, err: ToolError) -> Self {
        match err {
            ToolError::Params(m) => GatewayError::BadRequest(format!("parameter_error: {m}")),
            other => {
                tracing::error!(tool = %tool, "public tool execution failed: {}", other);
                GatewayError::Internal(TOOL_EXECUTION_FAILED.to_string())
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(request_id = %request_id, "gateway error ({}): {}", status.as_u16(), self);
        } else {
            tracing::warn!(request_id = %request_id, "gateway error ({}): {}", status.as_u16(), self);
        }

        let body = json!({
            "statusCode": status.as_u16(),
            "detail": self.to_string(),
        });
        let mut response = (status, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }
        response
    }
}
