//! Product review endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::entities::review;
use crate::errors::ServiceError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/{id}/reviews", get(list_reviews).post(create_review))
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i16,
    pub comment: Option<String>,
}

async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<review::Model>>, ServiceError> {
    Ok(Json(state.reviews.list_for_product(product_id).await?))
}

async fn create_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let saved = state
        .reviews
        .create_review(user.id, product_id, req.rating, req.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}
