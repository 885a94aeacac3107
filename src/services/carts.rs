//! Persistent per-customer carts. All lookups are scoped to the calling
//! customer; an item in someone else's cart is reported as not found.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, Set};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{cart, cart_item, product, product_color};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Clone)]
pub struct CartService {
    db: DbPool,
    events: EventSender,
}

/// Rejects quantities that do not fit the storage type instead of
/// letting them wrap negative.
fn bounded_quantity(quantity: u32) -> Result<i32, ServiceError> {
    i32::try_from(quantity)
        .map_err(|_| ServiceError::ValidationError(format!("quantity {} is too large", quantity)))
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub cart: cart::Model,
    pub items: Vec<cart_item::Model>,
}

impl CartService {
    pub fn new(db: DbPool, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Returns the customer's cart, creating an empty one on first use.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.ensure_cart(customer_id).await?;
        let items = cart
            .find_related(cart_item::Entity)
            .all(&self.db)
            .await?;
        Ok(CartView { cart, items })
    }

    async fn ensure_cart(&self, customer_id: Uuid) -> Result<cart::Model, ServiceError> {
        if let Some(existing) = cart::Entity::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&self.db)
            .await?
        {
            return Ok(existing);
        }

        let created = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&self.db)
        .await?;
        info!(customer_id = %customer_id, cart_id = %created.id, "cart created");
        Ok(created)
    }

    /// Adds a product to the cart. An existing line for the same product
    /// and color has its quantity increased instead of being duplicated.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        product_color_id: Option<Uuid>,
        quantity: u32,
    ) -> Result<CartView, ServiceError> {
        if quantity == 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }
        let quantity = bounded_quantity(quantity)?;

        let product = product::Entity::find_by_id(product_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", product_id)))?;

        if let Some(color_id) = product_color_id {
            let color = product_color::Entity::find_by_id(color_id)
                .one(&self.db)
                .await?;
            match color {
                Some(c) if c.product_id == product.id => {}
                _ => {
                    return Err(ServiceError::BadRequest(
                        "color does not belong to this product".to_string(),
                    ));
                }
            }
        }

        let cart = self.ensure_cart(customer_id).await?;

        let mut existing_filter = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id));
        existing_filter = match product_color_id {
            Some(color_id) => {
                existing_filter.filter(cart_item::Column::ProductColorId.eq(color_id))
            }
            None => existing_filter.filter(cart_item::Column::ProductColorId.is_null()),
        };

        match existing_filter.one(&self.db).await? {
            Some(line) => {
                let merged = line.quantity.checked_add(quantity).ok_or_else(|| {
                    ServiceError::ValidationError("quantity is too large".to_string())
                })?;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(merged);
                active.updated_at = Set(Some(Utc::now()));
                active.update(&self.db).await?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    product_color_id: Set(product_color_id),
                    quantity: Set(quantity),
                    created_at: Set(Utc::now()),
                    updated_at: Set(None),
                }
                .insert(&self.db)
                .await?;
            }
        }

        self.touch(cart.id).await
    }

    /// Sets the quantity of a line in the customer's cart. A quantity of
    /// zero removes the line.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: u32,
    ) -> Result<CartView, ServiceError> {
        let (line, cart) = self.owned_item(customer_id, item_id).await?;

        if quantity == 0 {
            line.delete(&self.db).await?;
        } else {
            let quantity = bounded_quantity(quantity)?;
            let mut active: cart_item::ActiveModel = line.into();
            active.quantity = Set(quantity);
            active.updated_at = Set(Some(Utc::now()));
            active.update(&self.db).await?;
        }

        self.touch(cart.id).await
    }

    /// Removes a line from the customer's cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let (line, cart) = self.owned_item(customer_id, item_id).await?;
        line.delete(&self.db).await?;
        self.touch(cart.id).await
    }

    /// Empties the customer's cart.
    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.ensure_cart(customer_id).await?;
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&self.db)
            .await?;
        self.touch(cart.id).await
    }

    /// Loads a cart line and proves the caller owns its cart.
    async fn owned_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
    ) -> Result<(cart_item::Model, cart::Model), ServiceError> {
        let not_found = || ServiceError::NotFound(format!("cart item {}", item_id));

        let line = cart_item::Entity::find_by_id(item_id)
            .one(&self.db)
            .await?
            .ok_or_else(not_found)?;
        let cart = cart::Entity::find_by_id(line.cart_id)
            .one(&self.db)
            .await?
            .ok_or_else(not_found)?;
        if cart.customer_id != customer_id {
            return Err(not_found());
        }
        Ok((line, cart))
    }

    async fn touch(&self, cart_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = cart::Entity::find_by_id(cart_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("cart {}", cart_id)))?;

        let mut active: cart::ActiveModel = cart.into();
        active.updated_at = Set(Some(Utc::now()));
        let cart = active.update(&self.db).await?;

        if let Err(e) = self.events.send(Event::CartUpdated { cart_id }).await {
            warn!(error = %e, "failed to publish cart event");
        }

        let items = cart
            .find_related(cart_item::Entity)
            .all(&self.db)
            .await?;
        Ok(CartView { cart, items })
    }
}
