pub mod buy_now_session;
pub mod cart;
pub mod cart_item;
pub mod customer;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod product_color;
pub mod review;
pub mod special_offer;

pub use buy_now_session::Entity as BuyNowSession;
pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use customer::Entity as Customer;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use payment::Entity as Payment;
pub use product::Entity as Product;
pub use product_color::Entity as ProductColor;
pub use review::Entity as Review;
pub use special_offer::Entity as SpecialOffer;
