//! Charge execution. A local payment row is written in `processing` state
//! before the provider is called, so a crash mid-charge leaves a record
//! to reconcile instead of a silent gap.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::pricing;
use crate::db::DbPool;
use crate::entities::{order, payment};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{ChargeRequest, GatewayError, PaymentGateway};

#[derive(Clone)]
pub struct PaymentService {
    db: DbPool,
    gateway: Arc<dyn PaymentGateway>,
    events: EventSender,
    currency: String,
}

/// Result of a successful synchronous charge. Final settlement still
/// arrives via webhook.
#[derive(Debug)]
pub struct ChargeOutcome {
    pub payment: payment::Model,
    pub payment_intent_id: String,
    pub amount_minor: i64,
    pub provider_status: String,
}

impl PaymentService {
    pub fn new(
        db: DbPool,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
        currency: String,
    ) -> Self {
        Self {
            db,
            gateway,
            events,
            currency,
        }
    }

    #[instrument(skip(self))]
    pub async fn find_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<payment::Model>, ServiceError> {
        Ok(payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&self.db)
            .await?)
    }

    /// Charges the order against the customer's saved instrument,
    /// off-session with immediate capture.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn charge_order(
        &self,
        order: &order::Model,
        remote_customer_id: &str,
        payment_method_id: &str,
    ) -> Result<ChargeOutcome, ServiceError> {
        if self.find_by_order(order.id).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "order {} already has a payment",
                order.id
            )));
        }

        let amount_minor = pricing::to_minor_units(order.total_amount)?;

        let recorded = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            amount: Set(order.total_amount),
            status: Set(payment::PaymentStatus::Processing),
            payment_method: Set("Card".to_string()),
            provider_payment_id: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&self.db)
        .await?;

        if let Err(e) = self
            .events
            .send(Event::PaymentRecorded {
                payment_id: recorded.id,
                order_id: order.id,
                amount: recorded.amount,
            })
            .await
        {
            warn!(error = %e, "failed to publish payment event");
        }

        let intent = match self
            .gateway
            .create_and_confirm_payment_intent(ChargeRequest {
                amount_minor,
                currency: self.currency.clone(),
                customer_id: remote_customer_id.to_string(),
                payment_method_id: payment_method_id.to_string(),
                order_id: order.id,
            })
            .await
        {
            Ok(intent) => intent,
            Err(e) => {
                // The row stays `processing`; the provider's
                // payment_failed webhook settles it.
                error!(order_id = %order.id, error = %e, "charge failed");
                if let Err(send_err) = self
                    .events
                    .send(Event::PaymentFailed { order_id: order.id })
                    .await
                {
                    warn!(error = %send_err, "failed to publish payment event");
                }
                return Err(match e {
                    GatewayError::Api { message, .. } => ServiceError::PaymentFailed(message),
                    other => ServiceError::ExternalApiError(other.to_string()),
                });
            }
        };

        let mut active: payment::ActiveModel = recorded.into();
        active.provider_payment_id = Set(Some(intent.id.clone()));
        active.updated_at = Set(Some(Utc::now()));
        let payment = active.update(&self.db).await?;

        info!(
            order_id = %order.id,
            payment_intent = %intent.id,
            provider_status = %intent.status,
            "charge submitted"
        );

        Ok(ChargeOutcome {
            payment,
            payment_intent_id: intent.id,
            amount_minor,
            provider_status: intent.status,
        })
    }
}
