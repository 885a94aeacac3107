//! Checkout endpoints: setup-intent creation, saved-card lookup and the
//! pay-order workflow itself.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::errors::ServiceError;
use crate::services::billing::{PaymentMethodDetails, SetupIntentResponse};
use crate::services::checkout::CheckoutOutcome;
use crate::services::orders::OrderLine;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create-setup-intent", post(create_setup_intent))
        .route("/payment-method/{id}", get(payment_method))
        .route("/pay-order", post(pay_order))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PayOrderRequest {
    #[validate(length(min = 1, message = "paymentMethodId is required"))]
    pub payment_method_id: String,
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub cart_items: Vec<PayOrderItem>,
    pub shipping_address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayOrderItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

async fn create_setup_intent(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SetupIntentResponse>, ServiceError> {
    let response = state.billing.create_setup_intent(user.id).await?;
    Ok(Json(response))
}

async fn payment_method(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentMethodDetails>, ServiceError> {
    let details = state.billing.payment_method_details(&id).await?;
    Ok(Json(details))
}

async fn pay_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<PayOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    req.validate()?;

    let lines: Vec<OrderLine> = req
        .cart_items
        .iter()
        .map(|item| OrderLine {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect();

    let outcome: CheckoutOutcome = state
        .checkout
        .pay_order(user.id, &req.payment_method_id, &lines, req.shipping_address)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
