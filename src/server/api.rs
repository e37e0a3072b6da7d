//! API route definitions

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::service::PredictionService;

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. See /api/health for API status.",
        })),
    )
}

/// Create the application router
pub fn create_router(service: Arc<PredictionService>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/data", get(handlers::data_summary))
        .route("/locations", get(handlers::locations))
        .route("/weather_stats", get(handlers::weather_stats))
        .route("/correlation", get(handlers::correlation))
        .route("/predict", post(handlers::predict))
        .fallback(handle_404);

    // The dashboard is served from a separate origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api_routes)
        .fallback(handle_404)
        .with_state(service)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
