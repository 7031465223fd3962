//! Route definitions and router construction.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            use axum::http::HeaderValue;
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// API routes without the `/api` prefix, for nesting.
///
/// Only the upload route lifts the default body limit.
pub(crate) fn api_routes(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(handlers::upload::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/stream/start", post(handlers::streams::start))
        .route("/stream/stop/{stream_id}", post(handlers::streams::stop))
        .route("/streams", get(handlers::streams::list))
        .route("/streams/{stream_id}", get(handlers::streams::get))
        .route("/events", get(handlers::events::stream))
}

/// Create the main router: `/health` plus everything under `/api`.
pub fn create_router(ctx: AxumContext, cors_config: &CorsConfig) -> Router {
    let upload_limit = usize::try_from(ctx.upload_limit).unwrap_or(usize::MAX);
    let state: AppState = Arc::new(ctx);
    let cors = build_cors_layer(cors_config);

    Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api",
            api_routes(upload_limit).with_state(state).layer(cors),
        )
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint.
pub(crate) async fn health_check() -> &'static str {
    "OK"
}
