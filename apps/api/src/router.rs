use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Arogya Care API is running!" }))
        .route("/health", get(|| async { "ok" }))
        .nest("/api/v1/appointments", appointment_routes(state))
}
