//! Cart endpoints. Every route acts on the authenticated customer's own
//! cart.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::ServiceError;
use crate::services::carts::CartView;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/{id}", put(update_item).delete(remove_item))
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub product_color_id: Option<Uuid>,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

async fn get_cart(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<CartView>, ServiceError> {
    Ok(Json(state.carts.get_cart(user.id).await?))
}

async fn add_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let view = state
        .carts
        .add_item(user.id, req.product_id, req.product_color_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartView>, ServiceError> {
    Ok(Json(state.carts.update_item(user.id, id, req.quantity).await?))
}

async fn remove_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CartView>, ServiceError> {
    Ok(Json(state.carts.remove_item(user.id, id).await?))
}

async fn clear_cart(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<CartView>, ServiceError> {
    Ok(Json(state.carts.clear(user.id).await?))
}
