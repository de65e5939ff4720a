//! Order Aggregate

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::domain::aggregates::{CartEntry, Product};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{OrderId, OrderItemId, Price, ProductId, UserId, ValueError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    total: Decimal,
    status: OrderStatus,
    shipping: ShippingDetails,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// One purchased line, priced at the time of purchase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub price: Price,
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal { self.price.times(self.quantity) }
}

/// A product and quantity requested at checkout. Carries no price.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl From<&CartEntry> for CheckoutLine {
    fn from(e: &CartEntry) -> Self { Self { product_id: e.product_id, quantity: e.quantity } }
}

/// Shipping form snapshot stored on the order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShippingDetails {
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
}

impl ShippingDetails {
    pub fn trimmed(&self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            address: self.address.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ValueError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ValueError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl Order {
    /// Builds a pending order, pricing each line at the product's current price.
    pub fn place(user_id: UserId, shipping: ShippingDetails, lines: &[(Product, u32)]) -> Result<(Self, Vec<OrderItem>), OrderError> {
        if lines.is_empty() { return Err(OrderError::NoItems); }
        if lines.iter().any(|(_, qty)| *qty == 0) { return Err(OrderError::InvalidQuantity); }
        let id = OrderId::new();
        let items: Vec<OrderItem> = lines
            .iter()
            .map(|(p, qty)| OrderItem { id: OrderItemId::new(), order_id: id, product_id: p.id(), price: p.price(), quantity: *qty })
            .collect();
        let total = items.iter().map(OrderItem::line_total).sum();
        let mut order = Self {
            id, user_id, total, status: OrderStatus::Pending, shipping, created_at: Utc::now(), events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: id, user_id, total }));
        Ok((order, items))
    }

    pub fn restore(id: OrderId, user_id: UserId, total: Decimal, status: OrderStatus, shipping: ShippingDetails, created_at: DateTime<Utc>) -> Self {
        Self { id, user_id, total, status, shipping, created_at, events: vec![] }
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn user_id(&self) -> UserId { self.user_id }
    pub fn total(&self) -> Decimal { self.total }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn shipping(&self) -> &ShippingDetails { &self.shipping }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn change_status(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        let from = self.status;
        if from == to { return Ok(()); }
        if from == OrderStatus::Delivered && to == OrderStatus::Cancelled { return Err(OrderError::CannotCancel); }
        self.status = to;
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("order quantities must be at least 1")]
    InvalidQuantity,
    #[error("a delivered order cannot be cancelled")]
    CannotCancel,
}
