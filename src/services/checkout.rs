//! The pay-order workflow: billing profile, instrument binding, order
//! assembly and the charge itself, in that order.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::billing::BillingService;
use super::orders::{OrderLine, OrderService};
use super::payments::PaymentService;
use crate::errors::ServiceError;

#[derive(Clone)]
pub struct CheckoutService {
    billing: BillingService,
    orders: OrderService,
    payments: PaymentService,
}

/// Response body of a completed pay-order call. `amount` is the order
/// total in major currency units; the provider-facing minor-unit figure
/// never leaves the payment service.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub success: bool,
    pub payment_intent_id: String,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub status: String,
}

impl CheckoutService {
    pub fn new(billing: BillingService, orders: OrderService, payments: PaymentService) -> Self {
        Self {
            billing,
            orders,
            payments,
        }
    }

    /// Runs the full checkout for an authenticated customer. Order
    /// creation commits before the charge is attempted; a declined charge
    /// leaves the order pending with its payment row awaiting webhook
    /// reconciliation.
    #[instrument(skip(self, lines, shipping_address), fields(customer_id = %customer_id))]
    pub async fn pay_order(
        &self,
        customer_id: Uuid,
        payment_method_id: &str,
        lines: &[OrderLine],
        shipping_address: Option<String>,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let customer = self.billing.ensure_customer(customer_id).await?;
        let remote_id = customer
            .remote_customer_id
            .ok_or_else(|| ServiceError::InternalError("missing remote customer id".into()))?;

        self.billing
            .bind_instrument(&remote_id, payment_method_id)
            .await?;

        let order = self
            .orders
            .create_order(customer_id, lines, shipping_address)
            .await?;

        let outcome = self
            .payments
            .charge_order(&order, &remote_id, payment_method_id)
            .await?;

        info!(
            order_id = %order.id,
            payment_intent = %outcome.payment_intent_id,
            "checkout completed"
        );

        Ok(CheckoutOutcome {
            success: outcome.provider_status == "succeeded",
            payment_intent_id: outcome.payment_intent_id,
            order_id: order.id,
            amount: order.total_amount,
            status: outcome.provider_status,
        })
    }
}
