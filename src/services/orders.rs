//! Order assembly. An order and its line items are written in one
//! transaction; line prices are frozen at creation time.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::pricing;
use crate::db::DbPool;
use crate::entities::{order, order_item, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Requested order line, before price resolution.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Clone)]
pub struct OrderService {
    db: DbPool,
    events: EventSender,
}

impl OrderService {
    pub fn new(db: DbPool, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Creates a pending order from the requested lines. Lines whose
    /// product no longer exists are skipped with a warning; each kept
    /// line freezes the discounted unit price in effect right now. Fails
    /// if nothing priceable remains.
    #[instrument(skip(self, lines), fields(customer_id = %customer_id, lines = lines.len()))]
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        lines: &[OrderLine],
        shipping_address: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "order must contain at least one line".to_string(),
            ));
        }
        for line in lines {
            if line.quantity == 0 {
                return Err(ServiceError::ValidationError(
                    "line quantity must be at least 1".to_string(),
                ));
            }
            if i32::try_from(line.quantity).is_err() {
                return Err(ServiceError::ValidationError(format!(
                    "line quantity {} is too large",
                    line.quantity
                )));
            }
        }

        let txn = self.db.begin().await?;

        let mut total = Decimal::ZERO;
        let mut priced: Vec<(&OrderLine, Decimal)> = Vec::with_capacity(lines.len());
        for line in lines {
            let Some(product) = product::Entity::find_by_id(line.product_id)
                .one(&txn)
                .await?
            else {
                warn!(product_id = %line.product_id, "product not found; line skipped");
                continue;
            };
            let unit_price = pricing::effective_price(&txn, &product).await?;
            total += unit_price * Decimal::from(line.quantity);
            priced.push((line, unit_price));
        }

        // Dropping the transaction rolls it back.
        if total <= Decimal::ZERO {
            return Err(ServiceError::InvalidTotal(total.to_string()));
        }

        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            total_amount: Set(total),
            shipping_address: Set(shipping_address),
            status: Set(order::OrderStatus::Pending),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        for (line, unit_price) in priced {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity as i32),
                unit_price: Set(unit_price),
                created_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        info!(order_id = %order.id, total = %order.total_amount, "order created");

        if let Err(e) = self
            .events
            .send(Event::OrderCreated {
                order_id: order.id,
                customer_id,
                total_amount: order.total_amount,
            })
            .await
        {
            warn!(error = %e, "failed to publish order event");
        }

        Ok(order)
    }
}
