// ---------------------------------------------------------------------------
// handlers/ - HTTP surface of the gateway
// Sub-modules group the privileged, public and system endpoints; mod.rs
// re-exports the handlers so lib.rs can route `crate::handlers::*`.
// ---------------------------------------------------------------------------

pub(crate) mod mcp;
pub(crate) mod public;
pub(crate) mod system;
#[cfg(test)]
mod tests;

// ── Re-exports ───────────────────────────────────────────────────────────────

// Privileged RPC + discovery
pub use mcp::{mcp_discovery, mcp_post};

// Public surface
pub use public::{
    public_describe, public_execute, public_health, public_metrics, public_stream, public_tools,
};

// Liveness / readiness
pub use system::healthz;

// ── Shared helpers ───────────────────────────────────────────────────────────

use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderMap};

use crate::error::GatewayError;

/// Raw `Authorization` header, if present and valid UTF-8.
pub(crate) fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok())
}

pub(crate) fn invalid_body(rejection: JsonRejection) -> GatewayError {
    GatewayError::BadRequest(format!("invalid request body: {}", rejection.body_text()))
}
