//! Data access for products, orders, order items and users.
//!
//! Services talk to the [`Repository`] trait object. [`PgRepository`] is the
//! production backend; [`InMemoryRepository`] backs tests and local demos and
//! honours the same contracts (unique emails, transactional order placement,
//! conditional stock decrement).

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::aggregates::{Order, OrderItem, OrderStatus, Product, User};
use crate::domain::value_objects::{Email, OrderId, ProductId, Stock, UserId, ValueError};
use crate::listing::{OrderQuery, Page, ProductQuery, UserQuery};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("data corruption: {0}")]
    DataCorruption(String),
    #[error("record not found")]
    NotFound,
    /// `available` is `None` when the product no longer exists.
    #[error("insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock { product_id: ProductId, requested: u32, available: Option<u32> },
    #[error("price of product {product_id} changed during checkout")]
    PriceChanged { product_id: ProductId },
}

/// Units requested per product, repeated products summed.
pub(crate) fn wanted_stock(items: &[OrderItem]) -> Result<Vec<(ProductId, u32)>, RepositoryError> {
    let mut wanted: Vec<(ProductId, u32)> = Vec::new();
    for item in items {
        match wanted.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((product_id, qty)) => {
                *qty = qty.checked_add(item.quantity).ok_or(RepositoryError::InsufficientStock {
                    product_id: *product_id,
                    requested: u32::MAX,
                    available: None,
                })?;
            }
            None => wanted.push((item.product_id, item.quantity)),
        }
    }
    Ok(wanted)
}

impl From<ValueError> for RepositoryError {
    fn from(e: ValueError) -> Self { Self::DataCorruption(e.to_string()) }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError>;
    /// Writes the catalog fields and image. Stock is left alone; see [`Self::set_stock`].
    async fn update_product(&self, product: &Product) -> Result<(), RepositoryError>;
    async fn set_stock(&self, id: ProductId, stock: Stock) -> Result<(), RepositoryError>;
    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts the order and its items and takes the purchased quantities off
    /// stock, all or nothing.
    async fn place_order(&self, order: &Order, items: &[OrderItem]) -> Result<(), RepositoryError>;
    async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>, RepositoryError>;
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError>;
    /// Units per order for a batch of orders. Orders without items are absent.
    async fn item_counts(&self, order_ids: &[OrderId]) -> Result<HashMap<OrderId, u32>, RepositoryError>;
    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, RepositoryError>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;
    /// Fails with `Conflict` when the email is already registered.
    async fn insert_user(&self, user: &User) -> Result<(), RepositoryError>;
    /// Writes everything but the email and creation time.
    async fn update_user(&self, user: &User) -> Result<(), RepositoryError>;
    /// Fails with `Conflict` while the user still owns orders.
    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError>;
}

pub trait Repository: ProductRepository + OrderRepository + UserRepository {}

impl<T: ProductRepository + OrderRepository + UserRepository> Repository for T {}
