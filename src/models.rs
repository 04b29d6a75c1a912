use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metrics::LatencyStats;

pub const PROTOCOL_VERSION: &str = "2.0";

// ---------------------------------------------------------------------------
// Privileged RPC envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub id: Value,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryResponse {
    pub ok: bool,
    pub endpoint: &'static str,
    pub protocol: &'static str,
    pub methods: Vec<&'static str>,
    #[serde(rename = "publicTools")]
    pub public_tools: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteResponse {
    pub method: String,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescription {
    pub tool: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamQuery {
    pub method: String,
    /// URL-encoded JSON object.
    #[serde(default)]
    pub params: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    pub ok: bool,
    pub metrics: std::collections::BTreeMap<String, LatencyStats>,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub ready: bool,
    pub tool_count: usize,
    pub tools: Vec<String>,
    pub github_oauth: bool,
    pub uptime_seconds: u64,
}
