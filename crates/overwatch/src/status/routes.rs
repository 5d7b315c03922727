//! Route table for the status server.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use super::handlers::{healthcheck, home, version};

/// Creates the status router.
pub fn create_router() -> Router {
    Router::new()
        .route("/", get(home))
        .route("/version", get(version))
        .route("/healthcheck", get(healthcheck))
        .layer(TraceLayer::new_for_http())
}
