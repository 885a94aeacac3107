//! Sales-ranked product listing: top products by units ordered over a
//! rolling thirty-day window.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{order_item, product};
use crate::errors::ServiceError;

const WINDOW_DAYS: i64 = 30;
const MAX_RESULTS: usize = 10;

#[derive(Debug, Serialize)]
pub struct BestSeller {
    pub product: product::Model,
    pub total_sold: i64,
}

/// Ranks products by units ordered in the last thirty days, most sold
/// first, capped at ten entries. Products deleted since their last sale
/// are dropped from the listing.
#[instrument(skip(db))]
pub async fn find_best_sellers(db: &DbPool) -> Result<Vec<BestSeller>, ServiceError> {
    let cutoff = Utc::now() - Duration::days(WINDOW_DAYS);

    let recent = order_item::Entity::find()
        .filter(order_item::Column::CreatedAt.gte(cutoff))
        .all(db)
        .await?;

    let mut totals: HashMap<Uuid, i64> = HashMap::new();
    for item in &recent {
        *totals.entry(item.product_id).or_insert(0) += i64::from(item.quantity);
    }

    let mut ranked: Vec<(Uuid, i64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(MAX_RESULTS);

    let ids: Vec<Uuid> = ranked.iter().map(|(id, _)| *id).collect();
    let products = product::Entity::find()
        .filter(product::Column::Id.is_in(ids))
        .all(db)
        .await?;

    let mut sellers = Vec::with_capacity(ranked.len());
    for (product_id, total_sold) in ranked {
        if let Some(found) = products.iter().find(|p| p.id == product_id) {
            sellers.push(BestSeller {
                product: found.clone(),
                total_sold,
            });
        }
    }
    Ok(sellers)
}
