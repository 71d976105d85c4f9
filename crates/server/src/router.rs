//! HTTP router construction.
//!
//! One GET route per pipeline stage; the external scheduler drives the
//! pipeline by polling the transfer directories and hitting these endpoints.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = match state.config.server.cors_origin.as_str() {
        "*" => CorsLayer::new().allow_origin(Any),
        origin => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new().allow_origin(value),
            Err(_) => CorsLayer::new().allow_origin(Any),
        },
    };

    Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health))
        .route("/split", get(api::split))
        .route("/extract", get(api::extract))
        .route("/generate", get(api::generate))
        .route("/insert", get(api::insert))
        .layer(cors)
        .with_state(state)
}
