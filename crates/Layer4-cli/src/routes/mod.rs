//! API routes

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

pub mod tasks;

/// Build the API router with all endpoints
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/tasks", tasks::router())
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
