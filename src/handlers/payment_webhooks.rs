//! Inbound payment provider webhook. The body is taken raw; signature
//! verification happens before any parsing.

use axum::{
    body::Bytes, extract::State, http::HeaderMap, routing::post, Json, Router,
};

use crate::errors::ServiceError;
use crate::services::webhooks::WebhookAck;
use crate::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhook", post(handle_webhook))
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::InvalidSignature("missing signature header".to_string()))?;

    let ack = state.webhooks.process(signature, &body).await?;
    Ok(Json(ack))
}
