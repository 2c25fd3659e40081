//! Route definitions for the codec endpoints.

use axum::routing::post;
use axum::Router;

use crate::handlers::codec;
use crate::state::AppState;

/// ```text
/// POST   /compress        -> compress
/// POST   /decompress      -> decompress
/// POST   /metrics         -> metrics
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/compress", post(codec::compress))
        .route("/decompress", post(codec::decompress))
        .route("/metrics", post(codec::metrics))
}
