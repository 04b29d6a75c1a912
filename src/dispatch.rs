//! Request orchestration for the privileged and public paths.
//!
//! The dispatcher owns the (immutable) registry, the public allow-list and the
//! latency recorder. Lookup, authorization and parameter binding are resolved
//! before a tool body runs; every tool failure is classified exactly once here
//! (`GatewayError::from_tool` privileged, `GatewayError::redacted` public).

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::auth;
use crate::error::{GatewayError, ToolError};
use crate::metrics::LatencyRecorder;
use crate::models::{ExecuteResponse, RpcRequest, RpcResponse, ToolDescription, PROTOCOL_VERSION};
use crate::params::{self, Params};
use crate::registry::{Tool, ToolRegistry};
use crate::sanitize::sanitize;

/// Tool names reachable without credentials. Sorted and deduplicated.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    names: BTreeSet<String>,
}

impl AllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .map(Into::into)
                .map(|n: String| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}

pub struct Dispatcher {
    registry: ToolRegistry,
    public: AllowList,
    latency: LatencyRecorder,
    auth_secret: Option<String>,
}

impl Dispatcher {
    pub fn new(
        registry: ToolRegistry,
        public: AllowList,
        latency: LatencyRecorder,
        auth_secret: Option<String>,
    ) -> Self {
        for name in public.names() {
            if !registry.contains(&name) {
                tracing::warn!(tool = %name, "public allow-list names an unregistered tool");
            }
        }
        Self {
            registry,
            public,
            latency,
            auth_secret: auth_secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn latency(&self) -> &LatencyRecorder {
        &self.latency
    }

    /// Run the tool to completion, recording its duration on success only.
    pub async fn invoke(&self, tool: &Tool, params: Params) -> Result<Value, ToolError> {
        let started = Instant::now();
        let value = tool.call(params).await?;
        self.record(tool.name(), started);
        Ok(value)
    }

    pub fn record(&self, tool: &str, started: Instant) {
        self.latency.record(tool, started.elapsed().as_secs_f64() * 1000.0);
    }

    // ── privileged path ─────────────────────────────────────────────────────

    pub fn authorize(&self, authorization: Option<&str>) -> Result<(), GatewayError> {
        Ok(auth::authenticate(authorization, self.auth_secret.as_deref())?)
    }

    pub async fn dispatch(
        &self,
        authorization: Option<&str>,
        request: RpcRequest,
    ) -> Result<RpcResponse, GatewayError> {
        self.authorize(authorization)?;

        let tool = self
            .registry
            .resolve(&request.method)
            .ok_or(GatewayError::NotFound)?;
        let params = params::from_envelope(request.params).map_err(GatewayError::from_tool)?;

        tracing::info!(tool = %tool.name(), "mcp: dispatch");
        let result = self
            .invoke(&tool, params)
            .await
            .map_err(GatewayError::from_tool)?;

        Ok(RpcResponse {
            protocol_version: PROTOCOL_VERSION.to_string(),
            id: request.id.unwrap_or(Value::Null),
            result,
        })
    }

    // ── public path ─────────────────────────────────────────────────────────

    pub fn list_public(&self) -> Vec<String> {
        self.public.names()
    }

    /// Allow-list membership is checked before existence.
    pub fn resolve_public(&self, name: &str) -> Result<Arc<Tool>, GatewayError> {
        if !self.public.contains(name) {
            return Err(GatewayError::Forbidden);
        }
        self.registry.resolve(name).ok_or(GatewayError::NotFound)
    }

    pub fn describe(&self, name: &str) -> Result<ToolDescription, GatewayError> {
        let tool = self.resolve_public(name)?;
        Ok(ToolDescription {
            tool: tool.name().to_string(),
            description: tool.description().to_string(),
        })
    }

    pub async fn execute(
        &self,
        name: &str,
        params: Option<Value>,
    ) -> Result<ExecuteResponse, GatewayError> {
        let tool = self.resolve_public(name)?;
        let params =
            params::from_envelope(params).map_err(|e| GatewayError::redacted(name, e))?;

        tracing::info!(tool = %name, "public: execute");
        let result = self
            .invoke(&tool, params)
            .await
            .map_err(|e| GatewayError::redacted(name, e))?;

        Ok(ExecuteResponse {
            method: name.to_string(),
            result: sanitize(&result),
        })
    }
}
