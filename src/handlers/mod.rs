pub mod auth;
pub mod buy_now;
pub mod carts;
pub mod common;
pub mod orders;
pub mod payment_webhooks;
pub mod products;
pub mod reviews;
