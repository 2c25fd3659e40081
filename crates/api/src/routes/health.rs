use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::codec::orchestrator::ToolStatus;
use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    tools: ToolStatus,
}

/// The service itself is up whenever this answers; `tools` reports whether
/// the configured executables can be launched.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        tools: state.orchestrator.tool_status().await,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
