//! Remote billing-customer lifecycle and saved-card management.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::gateway_error;
use crate::db::DbPool;
use crate::entities::customer;
use crate::errors::ServiceError;
use crate::gateway::{CardDetails, PaymentGateway};

#[derive(Clone)]
pub struct BillingService {
    db: DbPool,
    gateway: Arc<dyn PaymentGateway>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupIntentResponse {
    pub setup_intent_id: String,
    pub client_secret: String,
    pub customer_id: String,
}

/// Flat, safe-to-expose view of a saved card.
#[derive(Debug, Serialize)]
pub struct PaymentMethodDetails {
    pub id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
}

impl BillingService {
    pub fn new(db: DbPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { db, gateway }
    }

    /// Loads the customer and guarantees they have a remote billing
    /// profile, creating one lazily on first use.
    #[instrument(skip(self))]
    pub async fn ensure_customer(&self, customer_id: Uuid) -> Result<customer::Model, ServiceError> {
        let existing = customer::Entity::find_by_id(customer_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("customer {}", customer_id)))?;

        if existing.remote_customer_id.is_some() {
            return Ok(existing);
        }

        let remote = self
            .gateway
            .create_customer(&existing.email, existing.id)
            .await
            .map_err(gateway_error)?;
        info!(customer_id = %existing.id, remote_id = %remote.id, "billing customer created");

        let mut active: customer::ActiveModel = existing.into();
        active.remote_customer_id = Set(Some(remote.id));
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(&self.db).await?)
    }

    /// Opens a card-saving session for the calling customer.
    #[instrument(skip(self))]
    pub async fn create_setup_intent(
        &self,
        customer_id: Uuid,
    ) -> Result<SetupIntentResponse, ServiceError> {
        let customer = self.ensure_customer(customer_id).await?;
        let remote_id = customer
            .remote_customer_id
            .ok_or_else(|| ServiceError::InternalError("missing remote customer id".into()))?;

        let intent = self
            .gateway
            .create_setup_intent(&remote_id)
            .await
            .map_err(gateway_error)?;

        Ok(SetupIntentResponse {
            setup_intent_id: intent.id,
            client_secret: intent.client_secret,
            customer_id: remote_id,
        })
    }

    /// Fetches safe-to-expose details of a saved payment method.
    #[instrument(skip(self))]
    pub async fn payment_method_details(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethodDetails, ServiceError> {
        let method = self
            .gateway
            .retrieve_payment_method(payment_method_id)
            .await
            .map_err(gateway_error)?;
        let CardDetails {
            brand,
            last4,
            exp_month,
            exp_year,
        } = method.card.ok_or_else(|| {
            ServiceError::NotFound(format!(
                "payment method {} is not a card",
                payment_method_id
            ))
        })?;
        Ok(PaymentMethodDetails {
            id: method.id,
            brand,
            last4,
            exp_month,
            exp_year,
        })
    }

    /// Makes `payment_method_id` usable for off-session charges against
    /// `remote_customer_id`: attaches it if loose, rejects it if another
    /// customer owns it, and marks it as the default instrument.
    #[instrument(skip(self))]
    pub async fn bind_instrument(
        &self,
        remote_customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), ServiceError> {
        let method = self
            .gateway
            .retrieve_payment_method(payment_method_id)
            .await
            .map_err(gateway_error)?;

        match method.customer.as_deref() {
            Some(owner) if owner == remote_customer_id => {}
            Some(_) => {
                return Err(ServiceError::Conflict(
                    "payment method is attached to another customer".to_string(),
                ));
            }
            None => {
                self.gateway
                    .attach_payment_method(payment_method_id, remote_customer_id)
                    .await
                    .map_err(gateway_error)?;
            }
        }

        self.gateway
            .set_default_payment_method(remote_customer_id, payment_method_id)
            .await
            .map_err(gateway_error)?;
        Ok(())
    }
}
