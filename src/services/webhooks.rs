//! Inbound payment webhooks: signature verification over the raw body and
//! reconciliation of local payment state. The webhook is the authority on
//! whether a charge settled.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::payment::{self, PaymentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

type HmacSha256 = Hmac<Sha256>;

const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// Provider event envelope. Only the fields the reconciler needs.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: WebhookObject,
}

#[derive(Debug, Deserialize)]
pub struct WebhookObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Every handled request, including unknown event types and unmatched
/// payments, is acknowledged so the provider stops retrying.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Clone)]
pub struct WebhookService {
    db: DbPool,
    events: EventSender,
    secret: String,
    tolerance_secs: u64,
}

/// Verifies a `t=<unix>,v1=<hex>` signature header against the raw body.
/// The signed payload is `"{t}.{body}"`; comparison is constant-time and
/// the timestamp must fall within `tolerance_secs` of `now`.
pub fn verify_signature(
    secret: &str,
    tolerance_secs: u64,
    header: &str,
    body: &[u8],
    now: i64,
) -> Result<(), ServiceError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse().ok();
            }
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| ServiceError::InvalidSignature("missing or malformed timestamp".into()))?;
    if candidates.is_empty() {
        return Err(ServiceError::InvalidSignature(
            "missing v1 signature".into(),
        ));
    }
    if (now - timestamp).unsigned_abs() > tolerance_secs {
        return Err(ServiceError::InvalidSignature(
            "timestamp outside tolerance".into(),
        ));
    }

    for candidate in candidates {
        let Ok(decoded) = hex::decode(candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("bad webhook secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        if mac.verify_slice(&decoded).is_ok() {
            return Ok(());
        }
    }

    Err(ServiceError::InvalidSignature(
        "no matching signature".into(),
    ))
}

impl WebhookService {
    pub fn new(db: DbPool, events: EventSender, secret: String, tolerance_secs: u64) -> Self {
        Self {
            db,
            events,
            secret,
            tolerance_secs,
        }
    }

    /// Verifies the signature and applies the event. Nothing is read from
    /// the body before the signature checks out.
    #[instrument(skip(self, body, signature_header))]
    pub async fn process(
        &self,
        signature_header: &str,
        body: &[u8],
    ) -> Result<WebhookAck, ServiceError> {
        verify_signature(
            &self.secret,
            self.tolerance_secs,
            signature_header,
            body,
            Utc::now().timestamp(),
        )?;

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| ServiceError::BadRequest(format!("invalid webhook payload: {}", e)))?;
        self.handle_event(event).await
    }

    /// Applies a verified event. Status updates are idempotent; replays
    /// and out-of-order deliveries converge on the event's status.
    pub async fn handle_event(&self, event: WebhookEvent) -> Result<WebhookAck, ServiceError> {
        let status = match event.event_type.as_str() {
            EVENT_PAYMENT_SUCCEEDED => PaymentStatus::Succeeded,
            EVENT_PAYMENT_FAILED => PaymentStatus::Failed,
            other => {
                info!(event_type = other, "ignoring unhandled webhook event");
                return Ok(WebhookAck { received: true });
            }
        };

        let Some(order_id) = event
            .data
            .object
            .metadata
            .get("order_id")
            .and_then(|raw| Uuid::parse_str(raw).ok())
        else {
            warn!(
                payment_intent = %event.data.object.id,
                event_type = %event.event_type,
                "webhook event carries no usable order id"
            );
            return Ok(WebhookAck { received: true });
        };

        let Some(existing) = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&self.db)
            .await?
        else {
            warn!(order_id = %order_id, "webhook references unknown payment");
            return Ok(WebhookAck { received: true });
        };

        let mut active: payment::ActiveModel = existing.into();
        active.status = Set(status);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&self.db).await?;
        info!(order_id = %order_id, status = ?status, "payment reconciled");

        let domain_event = match status {
            PaymentStatus::Succeeded => Event::PaymentSucceeded { order_id },
            _ => Event::PaymentFailed { order_id },
        };
        if let Err(e) = self.events.send(domain_event).await {
            warn!(error = %e, "failed to publish payment event");
        }

        Ok(WebhookAck { received: true })
    }
}
