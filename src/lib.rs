pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod params;
pub mod registry;
pub mod runner;
pub mod sanitize;
pub mod state;
pub mod streaming;
pub mod tools;
pub mod upstream;

use axum::routing::{get, post};
use axum::Router;

use state::AppState;

/// Build the application router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(handlers::healthz))
        // Privileged JSON-RPC
        .route("/mcp", get(handlers::mcp_discovery).post(handlers::mcp_post))
        // Public surface
        .route("/public/health", get(handlers::public_health))
        .route("/public/tools", get(handlers::public_tools))
        .route("/public/describe/{name}", get(handlers::public_describe))
        .route("/public/execute", post(handlers::public_execute))
        .route("/public/stream", get(handlers::public_stream))
        .route("/public/metrics", get(handlers::public_metrics))
        // Shared state
        .with_state(state)
}
