//! Product reviews and the denormalized rating stats kept on the product
//! row.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{product, review};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

#[derive(Clone)]
pub struct ReviewService {
    db: DbPool,
    events: EventSender,
}

impl ReviewService {
    pub fn new(db: DbPool, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Stores a review and refreshes the product's rating stats in the
    /// same transaction.
    #[instrument(skip(self, comment))]
    pub async fn create_review(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> Result<review::Model, ServiceError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ServiceError::ValidationError(format!(
                "rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }

        let txn = self.db.begin().await?;

        let product = product::Entity::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", product_id)))?;

        let saved = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            customer_id: Set(customer_id),
            rating: Set(rating),
            comment: Set(comment),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        let ratings: Vec<i16> = review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|r| r.rating)
            .collect();
        let total = ratings.len() as i32;
        let sum: i64 = ratings.iter().map(|&r| r as i64).sum();
        let average = (Decimal::from(sum) / Decimal::from(total)).round_dp(2);

        let mut active: product::ActiveModel = product.into();
        active.average_rating = Set(average);
        active.total_reviews = Set(total);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        txn.commit().await?;
        info!(product_id = %product_id, rating, total_reviews = total, "review recorded");

        if let Err(e) = self
            .events
            .send(Event::ReviewCreated { product_id, rating })
            .await
        {
            warn!(error = %e, "failed to publish review event");
        }

        Ok(saved)
    }

    /// Lists a product's reviews, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<review::Model>, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", product_id)))?;

        Ok(review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }
}
