mod common;

use chrono::{DateTime, Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use common::{seed_customer, seed_product, spawn_app};
use storefront_api::db::DbPool;
use storefront_api::entities::{order, order_item};
use storefront_api::services::best_sellers::find_best_sellers;

async fn record_sale(
    db: &DbPool,
    customer_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    sold_at: DateTime<Utc>,
) {
    let placed = order::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        total_amount: Set(dec!(10.00)),
        shipping_address: Set(None),
        status: Set(order::OrderStatus::Completed),
        created_at: Set(sold_at),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap();

    order_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(placed.id),
        product_id: Set(product_id),
        quantity: Set(quantity),
        unit_price: Set(dec!(10.00)),
        created_at: Set(sold_at),
    }
    .insert(db)
    .await
    .unwrap();
}

#[tokio::test]
async fn products_rank_by_units_sold_in_the_window() {
    let app = spawn_app().await;
    let customer = seed_customer(&app.db, "buyer@example.com").await;
    let pen = seed_product(&app.db, "Pen", dec!(5.00)).await;
    let mug = seed_product(&app.db, "Mug", dec!(12.00)).await;
    let lamp = seed_product(&app.db, "Lamp", dec!(80.00)).await;
    let now = Utc::now();

    record_sale(&app.db, customer.id, pen.id, 2, now).await;
    record_sale(&app.db, customer.id, pen.id, 3, now - Duration::days(5)).await;
    record_sale(&app.db, customer.id, mug.id, 4, now).await;
    // Outside the thirty-day window; must not count.
    record_sale(&app.db, customer.id, lamp.id, 50, now - Duration::days(45)).await;

    let sellers = find_best_sellers(&app.db).await.unwrap();
    assert_eq!(sellers.len(), 2);
    assert_eq!(sellers[0].product.id, pen.id);
    assert_eq!(sellers[0].total_sold, 5);
    assert_eq!(sellers[1].product.id, mug.id);
    assert_eq!(sellers[1].total_sold, 4);
}

#[tokio::test]
async fn listing_is_capped_at_ten_products() {
    let app = spawn_app().await;
    let customer = seed_customer(&app.db, "buyer@example.com").await;
    let now = Utc::now();

    for n in 0..12 {
        let product = seed_product(&app.db, &format!("Item {}", n), dec!(5.00)).await;
        record_sale(&app.db, customer.id, product.id, n + 1, now).await;
    }

    let sellers = find_best_sellers(&app.db).await.unwrap();
    assert_eq!(sellers.len(), 10);
    // Most sold first; the two slowest sellers fell off.
    assert_eq!(sellers[0].total_sold, 12);
    assert_eq!(sellers[9].total_sold, 3);
}

#[tokio::test]
async fn no_recent_sales_means_an_empty_listing() {
    let app = spawn_app().await;
    seed_product(&app.db, "Pen", dec!(5.00)).await;

    let sellers = find_best_sellers(&app.db).await.unwrap();
    assert!(sellers.is_empty());
}
