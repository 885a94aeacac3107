//! Remote payment provider client.
//!
//! Everything that moves money goes through the [`PaymentGateway`] trait so
//! services receive the provider as an explicit dependency and tests can
//! substitute a scripted implementation.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use http::HttpPaymentGateway;

/// Remote billing-customer record.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayCustomer {
    pub id: String,
}

/// Card-saving session handed to the frontend.
#[derive(Debug, Clone, Deserialize)]
pub struct SetupIntent {
    pub id: String,
    pub client_secret: String,
}

/// Card details of a saved payment method. Only safe-to-expose fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
}

/// Saved payment instrument held by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    /// Remote customer currently owning this instrument, if attached.
    pub customer: Option<String>,
    pub card: Option<CardDetails>,
}

/// Immediate result of a charge attempt. Settlement is reconciled later
/// via webhook; this is only the provider's synchronous answer.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
}

/// Parameters for an immediate-capture charge against a saved instrument.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Amount in minor units (e.g. cents).
    pub amount_minor: i64,
    pub currency: String,
    pub customer_id: String,
    pub payment_method_id: String,
    /// Correlation id echoed back in webhook events.
    pub order_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The provider rejected the request (card declined, unknown id, ...).
    #[error("{message}")]
    Api {
        message: String,
        code: Option<String>,
        status: u16,
    },

    #[error("payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected payment provider response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Api { status: 404, .. })
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a remote billing customer for a local user.
    async fn create_customer(
        &self,
        email: &str,
        user_id: Uuid,
    ) -> Result<GatewayCustomer, GatewayError>;

    /// Opens a card-saving session for the given remote customer.
    async fn create_setup_intent(&self, customer_id: &str) -> Result<SetupIntent, GatewayError>;

    /// Fetches a saved payment method, including its current owner.
    async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, GatewayError>;

    /// Attaches an unowned payment method to a remote customer.
    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<(), GatewayError>;

    /// Marks the payment method as the customer's default instrument.
    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), GatewayError>;

    /// Creates and confirms a charge in one synchronous call (immediate
    /// capture, off-session). Returns the provider's reported status
    /// without waiting for final settlement.
    async fn create_and_confirm_payment_intent(
        &self,
        request: ChargeRequest,
    ) -> Result<PaymentIntent, GatewayError>;
}
