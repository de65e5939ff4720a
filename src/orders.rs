//! Order history for customers and order administration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{Order, OrderError, OrderItem, OrderStatus};
use crate::domain::value_objects::{OrderId, UserId};
use crate::listing::{OrderQuery, Page};
use crate::publisher::{publish_all, EventPublisher};
use crate::repository::{OrderRepository, ProductRepository, Repository, RepositoryError};

#[derive(Debug, Error)]
pub enum OrdersError {
    #[error("order not found")]
    NotFound,
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Listing row: the order plus the number of units it contains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub item_count: u32,
}

/// Purchased line with the product's current display fields, when the
/// product still exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    #[serde(flatten)]
    pub item: OrderItem,
    pub name: Option<String>,
    pub image_filename: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
}

pub struct OrderService {
    repo: Arc<dyn Repository>,
    events: Arc<dyn EventPublisher>,
}

impl OrderService {
    pub fn new(repo: Arc<dyn Repository>, events: Arc<dyn EventPublisher>) -> Self { Self { repo, events } }

    /// All orders, with item counts fetched in one batch.
    pub async fn list(&self, query: &OrderQuery) -> Result<Page<OrderSummary>, OrdersError> {
        let page = self.repo.list_orders(query).await?;
        let ids: Vec<OrderId> = page.data.iter().map(Order::id).collect();
        let counts = self.repo.item_counts(&ids).await?;
        Ok(page.map(|order| {
            let item_count = counts.get(&order.id()).copied().unwrap_or(0);
            OrderSummary { order, item_count }
        }))
    }

    /// Orders owned by `user_id`; any user filter in `query` is replaced.
    pub async fn list_for_user(&self, user_id: UserId, query: &OrderQuery) -> Result<Page<OrderSummary>, OrdersError> {
        let mut query = query.clone();
        query.filter.user_id = Some(user_id);
        self.list(&query).await
    }

    pub async fn detail(&self, id: OrderId) -> Result<OrderDetail, OrdersError> {
        let order = self.repo.get_order(id).await?.ok_or(OrdersError::NotFound)?;
        self.with_items(order).await
    }

    /// Someone else's order reads as not found.
    pub async fn detail_for_user(&self, user_id: UserId, id: OrderId) -> Result<OrderDetail, OrdersError> {
        let order = self
            .repo
            .get_order(id)
            .await?
            .filter(|o| o.user_id() == user_id)
            .ok_or(OrdersError::NotFound)?;
        self.with_items(order).await
    }

    pub async fn change_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, OrdersError> {
        let mut order = self.repo.get_order(id).await?.ok_or(OrdersError::NotFound)?;
        let from = order.status();
        order.change_status(status)?;
        if from != status {
            self.repo.set_order_status(id, status).await.map_err(|e| match e {
                RepositoryError::NotFound => OrdersError::NotFound,
                other => OrdersError::Repository(other),
            })?;
            tracing::info!(order_id = %id, %from, to = %status, "order status changed");
        }
        publish_all(self.events.as_ref(), order.take_events()).await;
        Ok(order)
    }

    async fn with_items(&self, order: Order) -> Result<OrderDetail, OrdersError> {
        let mut items = Vec::new();
        for item in self.repo.order_items(order.id()).await? {
            let product = self.repo.get_product(item.product_id).await?;
            items.push(OrderLine {
                name: product.as_ref().map(|p| p.name().to_string()),
                image_filename: product.as_ref().map(|p| p.image_filename().to_string()),
                item,
            });
        }
        Ok(OrderDetail { order, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::ShippingDetails;
    use crate::listing::{Direction, OrderFilter, OrderSort, Sort};
    use crate::publisher::recording::RecordingPublisher;
    use crate::repository::fixtures::product;
    use crate::repository::InMemoryRepository;

    async fn seed(repo: &InMemoryRepository, user_id: UserId, qty: u32) -> Order {
        let p = product("Widget", 1000, 100);
        repo.insert_product(&p).await.unwrap();
        let (order, items) = Order::place(user_id, ShippingDetails::default(), &[(p, qty)]).unwrap();
        repo.place_order(&order, &items).await.unwrap();
        order
    }

    fn service() -> (Arc<InMemoryRepository>, Arc<RecordingPublisher>, OrderService) {
        let repo = Arc::new(InMemoryRepository::new());
        let events = Arc::new(RecordingPublisher::default());
        (repo.clone(), events.clone(), OrderService::new(repo, events))
    }

    #[tokio::test]
    async fn test_customer_sees_only_own_orders() {
        let (repo, _, orders) = service();
        let (ana, marko) = (UserId::new(), UserId::new());
        let own = seed(&repo, ana, 2).await;
        let other = seed(&repo, marko, 1).await;

        let query = OrderQuery { filter: OrderFilter { user_id: Some(marko), ..Default::default() }, ..Default::default() };
        let page = orders.list_for_user(ana, &query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].order.id(), own.id());
        assert_eq!(page.data[0].item_count, 2);

        let detail = orders.detail_for_user(ana, own.id()).await.unwrap();
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].name.as_deref(), Some("Widget"));
        assert!(matches!(orders.detail_for_user(ana, other.id()).await, Err(OrdersError::NotFound)));
    }

    #[tokio::test]
    async fn test_admin_listing_filters_by_status() {
        let (repo, events, orders) = service();
        let first = seed(&repo, UserId::new(), 1).await;
        seed(&repo, UserId::new(), 3).await;
        orders.change_status(first.id(), OrderStatus::Shipped).await.unwrap();
        assert_eq!(events.subjects(), vec!["techstore.order.status_changed"]);

        let query = OrderQuery {
            filter: OrderFilter { status: Some(OrderStatus::Pending), ..Default::default() },
            sort: Sort::new(OrderSort::Total, Direction::Desc),
            ..Default::default()
        };
        let page = orders.list(&query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].item_count, 3);
    }

    #[tokio::test]
    async fn test_delivered_orders_cannot_be_cancelled() {
        let (repo, _, orders) = service();
        let order = seed(&repo, UserId::new(), 1).await;
        orders.change_status(order.id(), OrderStatus::Delivered).await.unwrap();
        let err = orders.change_status(order.id(), OrderStatus::Cancelled).await.unwrap_err();
        assert!(matches!(err, OrdersError::Order(OrderError::CannotCancel)));
        assert_eq!(orders.detail(order.id()).await.unwrap().order.status(), OrderStatus::Delivered);
        assert!(matches!(orders.change_status(OrderId::new(), OrderStatus::Shipped).await, Err(OrdersError::NotFound)));
    }
}
