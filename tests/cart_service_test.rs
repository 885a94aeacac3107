mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use common::{seed_customer, seed_product, spawn_app};
use storefront_api::entities::product_color;
use storefront_api::errors::ServiceError;

#[tokio::test]
async fn first_access_creates_an_empty_cart() {
    let app = spawn_app().await;
    let customer = seed_customer(&app.db, "shopper@example.com").await;

    let view = app.state.carts.get_cart(customer.id).await.unwrap();
    assert!(view.items.is_empty());
    assert_eq!(view.cart.customer_id, customer.id);

    // Same cart on the next call.
    let again = app.state.carts.get_cart(customer.id).await.unwrap();
    assert_eq!(again.cart.id, view.cart.id);
}

#[tokio::test]
async fn adding_the_same_product_merges_quantities() {
    let app = spawn_app().await;
    let customer = seed_customer(&app.db, "shopper@example.com").await;
    let product = seed_product(&app.db, "Pen", dec!(5.00)).await;

    app.state
        .carts
        .add_item(customer.id, product.id, None, 2)
        .await
        .unwrap();
    let view = app
        .state
        .carts
        .add_item(customer.id, product.id, None, 3)
        .await
        .unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 5);
}

#[tokio::test]
async fn color_variants_are_separate_lines() {
    let app = spawn_app().await;
    let customer = seed_customer(&app.db, "shopper@example.com").await;
    let product = seed_product(&app.db, "Shirt", dec!(35.00)).await;
    let red = product_color::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        name: Set("red".to_string()),
    }
    .insert(&app.db)
    .await
    .unwrap();

    app.state
        .carts
        .add_item(customer.id, product.id, None, 1)
        .await
        .unwrap();
    let view = app
        .state
        .carts
        .add_item(customer.id, product.id, Some(red.id), 1)
        .await
        .unwrap();
    assert_eq!(view.items.len(), 2);
}

#[tokio::test]
async fn color_of_another_product_is_rejected() {
    let app = spawn_app().await;
    let customer = seed_customer(&app.db, "shopper@example.com").await;
    let shirt = seed_product(&app.db, "Shirt", dec!(35.00)).await;
    let mug = seed_product(&app.db, "Mug", dec!(12.00)).await;
    let mug_blue = product_color::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(mug.id),
        name: Set("blue".to_string()),
    }
    .insert(&app.db)
    .await
    .unwrap();

    let err = app
        .state
        .carts
        .add_item(customer.id, shirt.id, Some(mug_blue.id), 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::BadRequest(_));
}

#[tokio::test]
async fn updating_to_zero_removes_the_line() {
    let app = spawn_app().await;
    let customer = seed_customer(&app.db, "shopper@example.com").await;
    let product = seed_product(&app.db, "Pen", dec!(5.00)).await;

    let view = app
        .state
        .carts
        .add_item(customer.id, product.id, None, 2)
        .await
        .unwrap();
    let item_id = view.items[0].id;

    let updated = app
        .state
        .carts
        .update_item(customer.id, item_id, 4)
        .await
        .unwrap();
    assert_eq!(updated.items[0].quantity, 4);

    let emptied = app
        .state
        .carts
        .update_item(customer.id, item_id, 0)
        .await
        .unwrap();
    assert!(emptied.items.is_empty());
}

#[tokio::test]
async fn another_customers_item_reads_as_not_found() {
    let app = spawn_app().await;
    let owner = seed_customer(&app.db, "owner@example.com").await;
    let intruder = seed_customer(&app.db, "intruder@example.com").await;
    let product = seed_product(&app.db, "Pen", dec!(5.00)).await;

    let view = app
        .state
        .carts
        .add_item(owner.id, product.id, None, 1)
        .await
        .unwrap();
    let item_id = view.items[0].id;

    let err = app
        .state
        .carts
        .remove_item(intruder.id, item_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    // Owner's line is untouched.
    let still_there = app.state.carts.get_cart(owner.id).await.unwrap();
    assert_eq!(still_there.items.len(), 1);
}

#[tokio::test]
async fn clear_empties_only_that_cart() {
    let app = spawn_app().await;
    let a = seed_customer(&app.db, "a@example.com").await;
    let b = seed_customer(&app.db, "b@example.com").await;
    let product = seed_product(&app.db, "Pen", dec!(5.00)).await;

    app.state
        .carts
        .add_item(a.id, product.id, None, 1)
        .await
        .unwrap();
    app.state
        .carts
        .add_item(b.id, product.id, None, 1)
        .await
        .unwrap();

    let cleared = app.state.carts.clear(a.id).await.unwrap();
    assert!(cleared.items.is_empty());
    assert_eq!(app.state.carts.get_cart(b.id).await.unwrap().items.len(), 1);
}

#[tokio::test]
async fn oversized_quantity_is_rejected_not_wrapped() {
    let app = spawn_app().await;
    let customer = seed_customer(&app.db, "shopper@example.com").await;
    let product = seed_product(&app.db, "Pen", dec!(5.00)).await;

    let err = app
        .state
        .carts
        .add_item(customer.id, product.id, None, 3_000_000_000)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert!(app
        .state
        .carts
        .get_cart(customer.id)
        .await
        .unwrap()
        .items
        .is_empty());

    // Same guard on updates to an existing line.
    let view = app
        .state
        .carts
        .add_item(customer.id, product.id, None, 2)
        .await
        .unwrap();
    let err = app
        .state
        .carts
        .update_item(customer.id, view.items[0].id, 3_000_000_000)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(
        app.state.carts.get_cart(customer.id).await.unwrap().items[0].quantity,
        2
    );
}

#[tokio::test]
async fn unknown_product_cannot_be_added() {
    let app = spawn_app().await;
    let customer = seed_customer(&app.db, "shopper@example.com").await;

    let err = app
        .state
        .carts
        .add_item(customer.id, Uuid::new_v4(), None, 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
