mod common;

use assert_matches::assert_matches;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use common::spawn_app;
use storefront_api::app_router;
use storefront_api::auth::{self, LoginRequest, RegisterRequest};
use storefront_api::errors::ServiceError;

#[tokio::test]
async fn register_then_login_issues_working_tokens() {
    let app = spawn_app().await;

    let registered = auth::register(
        &app.db,
        &app.auth,
        RegisterRequest {
            email: "new@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
        },
    )
    .await
    .unwrap();

    let claims = app.auth.validate_token(&registered.token).unwrap();
    assert_eq!(claims.sub, registered.customer_id);
    assert_eq!(claims.email, "new@example.com");

    let logged_in = auth::login(
        &app.db,
        &app.auth,
        LoginRequest {
            email: "new@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(logged_in.customer_id, registered.customer_id);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = spawn_app().await;
    let request = || RegisterRequest {
        email: "dup@example.com".to_string(),
        password: "hunter2hunter2".to_string(),
    };

    auth::register(&app.db, &app.auth, request()).await.unwrap();
    let err = auth::register(&app.db, &app.auth, request())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_fail_alike() {
    let app = spawn_app().await;
    auth::register(
        &app.db,
        &app.auth,
        RegisterRequest {
            email: "someone@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
        },
    )
    .await
    .unwrap();

    let wrong_password = auth::login(
        &app.db,
        &app.auth,
        LoginRequest {
            email: "someone@example.com".to_string(),
            password: "not-the-password".to_string(),
        },
    )
    .await
    .unwrap_err();
    let unknown_email = auth::login(
        &app.db,
        &app.auth,
        LoginRequest {
            email: "nobody@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
        },
    )
    .await
    .unwrap_err();

    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    assert_matches!(wrong_password, ServiceError::AuthError(_));
}

#[tokio::test]
async fn short_passwords_are_rejected() {
    let app = spawn_app().await;
    let err = auth::register(
        &app.db,
        &app.auth,
        RegisterRequest {
            email: "weak@example.com".to_string(),
            password: "short".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn protected_routes_require_a_valid_bearer_token() {
    let app = spawn_app().await;
    let router = app_router(app.state.clone());

    // No token at all.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/carts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Garbage token.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/carts")
                .header(header::AUTHORIZATION, "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Real token.
    let registered = auth::register(
        &app.db,
        &app.auth,
        RegisterRequest {
            email: "cart@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
        },
    )
    .await
    .unwrap();
    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/carts")
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", registered.token),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let view: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(view["items"].as_array().unwrap().is_empty());
}
