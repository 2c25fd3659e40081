use std::sync::Arc;

use crate::codec::orchestrator::JobOrchestrator;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Codec job orchestrator (owns the scratch area and tool gate).
    pub orchestrator: Arc<JobOrchestrator>,
}
