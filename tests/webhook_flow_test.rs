mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use sha2::Sha256;
use tower::util::ServiceExt;
use uuid::Uuid;

use common::{seed_customer, seed_product, spawn_app, TestApp, WEBHOOK_SECRET};
use storefront_api::app_router;
use storefront_api::entities::payment;
use storefront_api::services::orders::OrderLine;

fn sign(body: &[u8], timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

fn event_body(event_type: &str, payment_intent: &str, order_id: Uuid) -> Vec<u8> {
    serde_json::json!({
        "id": "evt_1",
        "type": event_type,
        "data": {
            "object": {
                "id": payment_intent,
                "metadata": { "order_id": order_id.to_string() }
            }
        }
    })
    .to_string()
    .into_bytes()
}

async fn post_webhook(app: &TestApp, body: Vec<u8>, signature: &str) -> (StatusCode, Vec<u8>) {
    let router = app_router(app.state.clone());
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payment/webhook")
                .header("content-type", "application/json")
                .header("stripe-signature", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

/// Runs a checkout and returns the created order id.
async fn checkout(app: &TestApp) -> Uuid {
    let customer = seed_customer(&app.db, "buyer@example.com").await;
    let product = seed_product(&app.db, "Desk", dec!(300.00)).await;
    let outcome = app
        .state
        .checkout
        .pay_order(
            customer.id,
            "pm_card_visa",
            &[OrderLine {
                product_id: product.id,
                quantity: 1,
            }],
            None,
        )
        .await
        .unwrap();
    outcome.order_id
}

async fn payment_status(app: &TestApp, order_id: Uuid) -> payment::PaymentStatus {
    payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn succeeded_event_settles_the_payment() {
    let app = spawn_app().await;
    let order_id = checkout(&app).await;

    let body = event_body("payment_intent.succeeded", "pi_1", order_id);
    let signature = sign(&body, Utc::now().timestamp());
    let (status, response) = post_webhook(&app, body, &signature).await;

    assert_eq!(status, StatusCode::OK);
    let ack: serde_json::Value = serde_json::from_slice(&response).unwrap();
    assert_eq!(ack["received"], true);
    assert_eq!(
        payment_status(&app, order_id).await,
        payment::PaymentStatus::Succeeded
    );
}

#[tokio::test]
async fn failed_event_marks_the_payment_failed() {
    let app = spawn_app().await;
    let order_id = checkout(&app).await;

    let body = event_body("payment_intent.payment_failed", "pi_1", order_id);
    let signature = sign(&body, Utc::now().timestamp());
    let (status, _) = post_webhook(&app, body, &signature).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payment_status(&app, order_id).await,
        payment::PaymentStatus::Failed
    );
}

#[tokio::test]
async fn bad_signature_is_rejected_without_touching_state() {
    let app = spawn_app().await;
    let order_id = checkout(&app).await;

    let body = event_body("payment_intent.succeeded", "pi_1", order_id);
    let (status, _) = post_webhook(&app, body, "t=123,v1=deadbeef").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        payment_status(&app, order_id).await,
        payment::PaymentStatus::Processing
    );
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let app = spawn_app().await;
    let order_id = checkout(&app).await;
    let body = event_body("payment_intent.succeeded", "pi_1", order_id);

    let router = app_router(app.state.clone());
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payment/webhook")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_event_types_are_acknowledged() {
    let app = spawn_app().await;
    let order_id = checkout(&app).await;

    let body = event_body("charge.refunded", "pi_1", order_id);
    let signature = sign(&body, Utc::now().timestamp());
    let (status, _) = post_webhook(&app, body, &signature).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payment_status(&app, order_id).await,
        payment::PaymentStatus::Processing
    );
}

#[tokio::test]
async fn events_for_unknown_payments_are_acknowledged() {
    let app = spawn_app().await;

    let body = event_body("payment_intent.succeeded", "pi_1", Uuid::new_v4());
    let signature = sign(&body, Utc::now().timestamp());
    let (status, response) = post_webhook(&app, body, &signature).await;

    assert_eq!(status, StatusCode::OK);
    let ack: serde_json::Value = serde_json::from_slice(&response).unwrap();
    assert_eq!(ack["received"], true);
}

#[tokio::test]
async fn replayed_events_are_idempotent() {
    let app = spawn_app().await;
    let order_id = checkout(&app).await;

    let body = event_body("payment_intent.succeeded", "pi_1", order_id);
    let signature = sign(&body, Utc::now().timestamp());
    for _ in 0..3 {
        let (status, _) = post_webhook(&app, body.clone(), &signature).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(
        payment_status(&app, order_id).await,
        payment::PaymentStatus::Succeeded
    );
}

#[tokio::test]
async fn failure_after_success_still_applies_the_event_status() {
    let app = spawn_app().await;
    let order_id = checkout(&app).await;

    let success = event_body("payment_intent.succeeded", "pi_1", order_id);
    let signature = sign(&success, Utc::now().timestamp());
    post_webhook(&app, success, &signature).await;

    let failure = event_body("payment_intent.payment_failed", "pi_1", order_id);
    let signature = sign(&failure, Utc::now().timestamp());
    post_webhook(&app, failure, &signature).await;

    assert_eq!(
        payment_status(&app, order_id).await,
        payment::PaymentStatus::Failed
    );
}
