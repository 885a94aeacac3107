//! Storefront API: customer accounts, carts, reviews and a card-on-file
//! checkout flow reconciled against a remote payment provider.

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod migrator;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use crate::services::billing::BillingService;
use crate::services::buy_now::BuyNowService;
use crate::services::carts::CartService;
use crate::services::checkout::CheckoutService;
use crate::services::orders::OrderService;
use crate::services::payments::PaymentService;
use crate::services::reviews::ReviewService;
use crate::services::webhooks::WebhookService;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub billing: BillingService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub checkout: CheckoutService,
    pub webhooks: WebhookService,
    pub carts: CartService,
    pub reviews: ReviewService,
    pub buy_now: BuyNowService,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    /// Wires the service graph from a database connection, a payment
    /// gateway and the loaded configuration.
    pub fn new(
        db: DbPool,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
        config: AppConfig,
    ) -> Self {
        let auth = AuthService::new(&config.jwt_secret, config.jwt_expiration_secs);
        let billing = BillingService::new(db.clone(), gateway.clone());
        let orders = OrderService::new(db.clone(), events.clone());
        let payments = PaymentService::new(
            db.clone(),
            gateway,
            events.clone(),
            config.currency.clone(),
        );
        let checkout = CheckoutService::new(billing.clone(), orders.clone(), payments.clone());
        let webhooks = WebhookService::new(
            db.clone(),
            events.clone(),
            config.payment_webhook_secret.clone(),
            config.payment_webhook_tolerance_secs,
        );
        let carts = CartService::new(db.clone(), events.clone());
        let reviews = ReviewService::new(db.clone(), events);
        let buy_now = BuyNowService::new(db.clone());

        Self {
            db,
            config: Arc::new(config),
            auth,
            billing,
            orders,
            payments,
            checkout,
            webhooks,
            carts,
            reviews,
            buy_now,
        }
    }
}

/// Builds the full application router.
pub fn app_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/orders", handlers::orders::routes())
        .nest("/payment", handlers::payment_webhooks::routes())
        .nest("/carts", handlers::carts::routes())
        .nest("/buy-now", handlers::buy_now::routes())
        .nest(
            "/products",
            handlers::products::routes().merge(handlers::reviews::routes()),
        );

    Router::new()
        .route("/health", get(handlers::common::health))
        .route("/status", get(handlers::common::status))
        .nest("/auth", handlers::auth::routes())
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
