//! Single-product express checkout sessions. A customer holds at most
//! one session at a time; starting another replaces it and restarts the
//! expiry window.

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{buy_now_session, product, product_color};
use crate::errors::ServiceError;

/// How long a session stays valid after it is started or refreshed.
const SESSION_TTL_MINUTES: i64 = 15;

#[derive(Clone)]
pub struct BuyNowService {
    db: DbPool,
}

#[derive(Debug, Serialize)]
pub struct BuyNowView {
    pub session: buy_now_session::Model,
    pub product: product::Model,
    pub color: product_color::Model,
}

impl BuyNowService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Starts (or replaces) the customer's session for one unit of the
    /// given product and color.
    #[instrument(skip(self))]
    pub async fn start_session(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        product_color_id: Uuid,
    ) -> Result<BuyNowView, ServiceError> {
        let product = product::Entity::find_by_id(product_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::BadRequest(format!("invalid product {}", product_id)))?;

        let color = product_color::Entity::find_by_id(product_color_id)
            .one(&self.db)
            .await?;
        let color = match color {
            Some(c) if c.product_id == product.id => c,
            _ => {
                return Err(ServiceError::BadRequest(
                    "color does not belong to this product".to_string(),
                ));
            }
        };

        let expires_at = Utc::now() + Duration::minutes(SESSION_TTL_MINUTES);
        let existing = buy_now_session::Entity::find()
            .filter(buy_now_session::Column::CustomerId.eq(customer_id))
            .one(&self.db)
            .await?;

        let session = match existing {
            Some(session) => {
                let mut active: buy_now_session::ActiveModel = session.into();
                active.product_id = Set(product_id);
                active.product_color_id = Set(product_color_id);
                active.quantity = Set(1);
                active.expires_at = Set(expires_at);
                active.updated_at = Set(Some(Utc::now()));
                active.update(&self.db).await?
            }
            None => {
                buy_now_session::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    customer_id: Set(customer_id),
                    product_id: Set(product_id),
                    product_color_id: Set(product_color_id),
                    quantity: Set(1),
                    expires_at: Set(expires_at),
                    created_at: Set(Utc::now()),
                    updated_at: Set(None),
                }
                .insert(&self.db)
                .await?
            }
        };
        info!(
            customer_id = %customer_id,
            session_id = %session.id,
            expires_at = %session.expires_at,
            "buy-now session started"
        );

        Ok(BuyNowView {
            session,
            product,
            color,
        })
    }

    /// Returns the customer's live session, or `None` when there is no
    /// session or it has expired. Expired rows are left in place; the
    /// next start overwrites them.
    #[instrument(skip(self))]
    pub async fn current_session(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<BuyNowView>, ServiceError> {
        let Some(session) = buy_now_session::Entity::find()
            .filter(buy_now_session::Column::CustomerId.eq(customer_id))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        if session.expires_at < Utc::now() {
            return Ok(None);
        }

        let Some(product) = product::Entity::find_by_id(session.product_id)
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let Some(color) = product_color::Entity::find_by_id(session.product_color_id)
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(BuyNowView {
            session,
            product,
            color,
        }))
    }

    /// Removes the customer's session, returning how many rows went away.
    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: Uuid) -> Result<u64, ServiceError> {
        let result = buy_now_session::Entity::delete_many()
            .filter(buy_now_session::Column::CustomerId.eq(customer_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
