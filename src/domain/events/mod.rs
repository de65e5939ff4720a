//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::{OrderId, ProductId, UserId};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: ProductId, name: String },
    StockAdjusted { product_id: ProductId, from: u32, to: u32 },
    Deleted { product_id: ProductId },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: OrderId, user_id: UserId, total: Decimal },
    StatusChanged { order_id: OrderId, from: OrderStatus, to: OrderStatus },
}

impl DomainEvent {
    /// Messaging subject, e.g. `techstore.order.placed`.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::Created { .. }) => "techstore.product.created",
            Self::Product(ProductEvent::StockAdjusted { .. }) => "techstore.product.stock_adjusted",
            Self::Product(ProductEvent::Deleted { .. }) => "techstore.product.deleted",
            Self::Order(OrderEvent::Placed { .. }) => "techstore.order.placed",
            Self::Order(OrderEvent::StatusChanged { .. }) => "techstore.order.status_changed",
        }
    }
}
