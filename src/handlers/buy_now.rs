//! Express checkout session endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::ServiceError;
use crate::services::buy_now::BuyNowView;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/",
        post(start_session).get(current_session).delete(clear_session),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBuyNowRequest {
    pub product_id: Uuid,
    pub color_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BuyNowStartedResponse {
    pub success: bool,
    pub session: BuyNowView,
}

#[derive(Debug, Serialize)]
pub struct BuyNowCurrentResponse {
    pub session: Option<BuyNowView>,
}

#[derive(Debug, Serialize)]
pub struct BuyNowClearedResponse {
    pub success: bool,
    pub deleted: u64,
}

async fn start_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<StartBuyNowRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state
        .buy_now
        .start_session(user.id, req.product_id, req.color_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(BuyNowStartedResponse {
            success: true,
            session,
        }),
    ))
}

async fn current_session(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<BuyNowCurrentResponse>, ServiceError> {
    let session = state.buy_now.current_session(user.id).await?;
    Ok(Json(BuyNowCurrentResponse { session }))
}

async fn clear_session(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<BuyNowClearedResponse>, ServiceError> {
    let deleted = state.buy_now.clear(user.id).await?;
    Ok(Json(BuyNowClearedResponse {
        success: true,
        deleted,
    }))
}
