//! Shared test fixtures: an in-memory database with the real migrations
//! applied and a scripted payment gateway.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Database, Set};
use uuid::Uuid;

use storefront_api::auth::AuthService;
use storefront_api::config::AppConfig;
use storefront_api::db::{run_migrations, DbPool};
use storefront_api::entities::special_offer::DiscountType;
use storefront_api::entities::{customer, product, special_offer};
use storefront_api::events;
use storefront_api::gateway::{
    CardDetails, ChargeRequest, GatewayCustomer, GatewayError, PaymentGateway, PaymentIntent,
    PaymentMethod, SetupIntent,
};
use storefront_api::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

#[derive(Default)]
struct MockGatewayState {
    counter: u32,
    create_customer_calls: u32,
    /// payment method id -> owning remote customer
    attached: HashMap<String, String>,
    defaults: Vec<(String, String)>,
    charges: Vec<ChargeRequest>,
    decline_message: Option<String>,
}

/// Scripted in-memory payment provider.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockGatewayState>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every later charge fail with a decline.
    pub fn decline_charges(&self, message: &str) {
        self.state.lock().unwrap().decline_message = Some(message.to_string());
    }

    /// Registers a payment method already attached to a remote customer.
    pub fn preattach(&self, payment_method_id: &str, owner: &str) {
        self.state
            .lock()
            .unwrap()
            .attached
            .insert(payment_method_id.to_string(), owner.to_string());
    }

    pub fn create_customer_calls(&self) -> u32 {
        self.state.lock().unwrap().create_customer_calls
    }

    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.state.lock().unwrap().charges.clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.counter += 1;
        format!("{}_{}", prefix, state.counter)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_customer(
        &self,
        _email: &str,
        _user_id: Uuid,
    ) -> Result<GatewayCustomer, GatewayError> {
        let id = self.next_id("cus");
        self.state.lock().unwrap().create_customer_calls += 1;
        Ok(GatewayCustomer { id })
    }

    async fn create_setup_intent(&self, _customer_id: &str) -> Result<SetupIntent, GatewayError> {
        let id = self.next_id("seti");
        Ok(SetupIntent {
            client_secret: format!("{}_secret", id),
            id,
        })
    }

    async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, GatewayError> {
        if payment_method_id.starts_with("pm_missing") {
            return Err(GatewayError::Api {
                message: format!("No such payment method: {}", payment_method_id),
                code: Some("resource_missing".to_string()),
                status: 404,
            });
        }
        let owner = self
            .state
            .lock()
            .unwrap()
            .attached
            .get(payment_method_id)
            .cloned();
        Ok(PaymentMethod {
            id: payment_method_id.to_string(),
            customer: owner,
            card: Some(CardDetails {
                brand: "visa".to_string(),
                last4: "4242".to_string(),
                exp_month: 12,
                exp_year: 2031,
            }),
        })
    }

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<(), GatewayError> {
        self.state
            .lock()
            .unwrap()
            .attached
            .insert(payment_method_id.to_string(), customer_id.to_string());
        Ok(())
    }

    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), GatewayError> {
        self.state
            .lock()
            .unwrap()
            .defaults
            .push((customer_id.to_string(), payment_method_id.to_string()));
        Ok(())
    }

    async fn create_and_confirm_payment_intent(
        &self,
        request: ChargeRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        let decline = self.state.lock().unwrap().decline_message.clone();
        if let Some(message) = decline {
            return Err(GatewayError::Api {
                message,
                code: Some("card_declined".to_string()),
                status: 402,
            });
        }
        let id = self.next_id("pi");
        self.state.lock().unwrap().charges.push(request);
        Ok(PaymentIntent {
            id,
            status: "succeeded".to_string(),
        })
    }
}

pub fn test_config() -> AppConfig {
    let raw = r#"
        database_url = "sqlite::memory:"
        jwt_secret = "integration_test_jwt_secret_that_is_definitely_longer_than_64_characters_x"
        payment_secret_key = "sk_test_123"
        payment_webhook_secret = "whsec_test_secret"
    "#;
    config::Config::builder()
        .add_source(config::File::from_str(raw, config::FileFormat::Toml))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap()
}

pub struct TestApp {
    pub state: AppState,
    pub db: DbPool,
    pub gateway: Arc<MockGateway>,
    pub auth: AuthService,
}

/// Fresh application over an in-memory database with all migrations run.
pub async fn spawn_app() -> TestApp {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    run_migrations(&db).await.unwrap();

    let gateway = MockGateway::new();
    let (sender, mut receiver) = events::channel(64);
    // Drain events so senders never block.
    tokio::spawn(async move { while receiver.recv().await.is_some() {} });

    let state = AppState::new(db.clone(), gateway.clone(), sender, test_config());
    let auth = state.auth.clone();
    TestApp {
        state,
        db,
        gateway,
        auth,
    }
}

pub async fn seed_customer(db: &DbPool, email: &str) -> customer::Model {
    customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("$argon2id$unused".to_string()),
        remote_customer_id: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_product(db: &DbPool, name: &str, price: Decimal) -> product::Model {
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price),
        average_rating: Set(Decimal::ZERO),
        total_reviews: Set(0),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_offer(
    db: &DbPool,
    product_id: Uuid,
    discount_type: DiscountType,
    value: Decimal,
    active: bool,
) -> special_offer::Model {
    special_offer::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        discount_type: Set(discount_type),
        discount_value: Set(value),
        is_active: Set(active),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap()
}
