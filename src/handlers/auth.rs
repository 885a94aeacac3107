//! Registration and login endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};

use crate::auth::{self, AuthResponse, LoginRequest, RegisterRequest};
use crate::errors::ServiceError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response: AuthResponse = auth::register(&state.db, &state.auth, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ServiceError> {
    let response = auth::login(&state.db, &state.auth, req).await?;
    Ok(Json(response))
}
