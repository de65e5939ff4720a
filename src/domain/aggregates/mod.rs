//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod user;

pub use product::{Product, ProductDraft, ProductError};
pub use order::{CheckoutLine, Order, OrderError, OrderItem, OrderStatus, ShippingDetails};
pub use cart::{Cart, CartEntry, CartError};
pub use user::{ProfileUpdate, User};
