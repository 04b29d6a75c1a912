// ---------------------------------------------------------------------------
// handlers/system.rs - Liveness and readiness
// ---------------------------------------------------------------------------

use axum::extract::State;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// GET /healthz - always 200 while the process is up; `ready` flips once
/// startup composition has finished.
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let tools = state.dispatcher.registry().list_names();
    Json(HealthResponse {
        ok: true,
        ready: state.is_ready(),
        tool_count: tools.len(),
        tools,
        github_oauth: state.github_oauth,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
