// ---------------------------------------------------------------------------
// handlers/mcp.rs - Privileged JSON-RPC endpoint and its discovery document
// ---------------------------------------------------------------------------

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::error::GatewayError;
use crate::models::{DiscoveryResponse, RpcRequest, RpcResponse};
use crate::state::AppState;

use super::{authorization, invalid_body};

/// POST /mcp - Bearer-authenticated invocation of any registered tool.
/// Credentials are checked before a malformed body is reported.
pub async fn mcp_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RpcRequest>, JsonRejection>,
) -> Result<Json<RpcResponse>, GatewayError> {
    let auth = authorization(&headers);
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            state.dispatcher.authorize(auth)?;
            return Err(invalid_body(rejection));
        }
    };
    Ok(Json(state.dispatcher.dispatch(auth, request).await?))
}

/// GET /mcp - unauthenticated description of the RPC endpoint.
pub async fn mcp_discovery(State(state): State<AppState>) -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        ok: true,
        endpoint: "/mcp",
        protocol: "jsonrpc-2.0",
        methods: vec!["POST"],
        public_tools: state.dispatcher.list_public(),
    })
}
