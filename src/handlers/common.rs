//! Liveness and readiness endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub database: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Readiness probe. Reports degraded instead of failing when the
/// database is unreachable.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };
    Json(StatusResponse {
        status: if database == "up" { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        database,
    })
}
