pub mod codec;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /compress          POST  multipart `audio`         -> artifacts + results
/// /decompress        POST  multipart `compressed`    -> reconstructed artifact
/// /metrics           POST  multipart `audio` x2      -> metrics
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(codec::router())
}
