//! Discount-aware pricing. Both the order total and the frozen per-line
//! unit price come from [`effective_price`], so the two can never drift.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::instrument;

use crate::entities::special_offer::{self, DiscountType};
use crate::entities::{product, special_offer::Entity as SpecialOffers};
use crate::errors::ServiceError;

/// Applies a single offer to a base price. Percentage offers take a cut
/// of the base; fixed offers subtract an absolute amount. The result is
/// clamped at zero and rounded to two fraction digits.
pub fn apply_offer(base: Decimal, offer: &special_offer::Model) -> Decimal {
    let discounted = match offer.discount_type {
        DiscountType::Percentage => base - base * offer.discount_value / dec!(100),
        DiscountType::Fixed => base - offer.discount_value,
    };
    discounted.max(Decimal::ZERO).round_dp(2)
}

/// Resolves the price a customer pays for one unit of `product` right now:
/// the base price with the first active offer applied, oldest offer first.
/// Inactive offers are ignored; with no active offer the base price stands.
#[instrument(skip(db, product), fields(product_id = %product.id))]
pub async fn effective_price<C: ConnectionTrait>(
    db: &C,
    product: &product::Model,
) -> Result<Decimal, ServiceError> {
    let offer = SpecialOffers::find()
        .filter(special_offer::Column::ProductId.eq(product.id))
        .filter(special_offer::Column::IsActive.eq(true))
        .order_by_asc(special_offer::Column::CreatedAt)
        .one(db)
        .await?;

    Ok(match offer {
        Some(offer) => apply_offer(product.price, &offer),
        None => product.price,
    })
}

/// Converts a decimal major-unit amount to the provider's integer minor
/// units (e.g. 230.00 -> 23000), rounding half away from zero.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    let minor =
        (amount * dec!(100)).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    minor
        .to_i64()
        .ok_or_else(|| ServiceError::InternalError(format!("amount out of range: {}", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn offer(discount_type: DiscountType, value: Decimal) -> special_offer::Model {
        special_offer::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            discount_type,
            discount_value: value,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn percentage_offer_takes_a_cut() {
        let price = apply_offer(dec!(200.00), &offer(DiscountType::Percentage, dec!(25)));
        assert_eq!(price, dec!(150.00));
    }

    #[test]
    fn fixed_offer_subtracts_absolute_amount() {
        let price = apply_offer(dec!(200.00), &offer(DiscountType::Fixed, dec!(30)));
        assert_eq!(price, dec!(170.00));
    }

    #[test]
    fn oversized_fixed_offer_clamps_to_zero() {
        let price = apply_offer(dec!(20.00), &offer(DiscountType::Fixed, dec!(50)));
        assert_eq!(price, Decimal::ZERO);
    }

    #[test]
    fn full_percentage_offer_is_free() {
        let price = apply_offer(dec!(99.99), &offer(DiscountType::Percentage, dec!(100)));
        assert_eq!(price, Decimal::ZERO);
    }

    #[test]
    fn minor_units_round_half_away_from_zero() {
        assert_eq!(to_minor_units(dec!(230.00)).unwrap(), 23000);
        assert_eq!(to_minor_units(dec!(10.005)).unwrap(), 1001);
        assert_eq!(to_minor_units(dec!(0.004)).unwrap(), 0);
    }
}
