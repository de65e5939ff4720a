//! Order placement from a cart snapshot.
//!
//! Only product ids and quantities are taken from the caller. Each product is
//! loaded for the stock pre-check and the order is priced from those rows.
//! The order row, its items and the stock decrements are then handed to the
//! repository as one unit, so a failed checkout leaves nothing behind.

use std::sync::Arc;

use thiserror::Error;
use validator::Validate;

use crate::domain::aggregates::{CheckoutLine, Order, OrderError, Product, ShippingDetails};
use crate::domain::value_objects::{ProductId, UserId};
use crate::publisher::{publish_all, EventPublisher};
use crate::repository::{OrderRepository, ProductRepository, Repository, RepositoryError};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,
    #[error("invalid shipping details: {0}")]
    InvalidShipping(String),
    #[error("not enough stock for {product}: requested {requested}, available {available}")]
    StockShortage { product: String, requested: u32, available: u32 },
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct CheckoutService {
    repo: Arc<dyn Repository>,
    events: Arc<dyn EventPublisher>,
}

impl CheckoutService {
    pub fn new(repo: Arc<dyn Repository>, events: Arc<dyn EventPublisher>) -> Self { Self { repo, events } }

    pub async fn place_order(
        &self,
        user_id: UserId,
        shipping: &ShippingDetails,
        lines: &[CheckoutLine],
    ) -> Result<Order, CheckoutError> {
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let shipping = shipping.trimmed();
        shipping.validate().map_err(|e| CheckoutError::InvalidShipping(e.to_string()))?;

        let mut priced: Vec<(Product, u32)> = Vec::with_capacity(lines.len());
        for line in merge_lines(lines)? {
            let product = self.repo.get_product(line.product_id).await?;
            let available = product.as_ref().map_or(0, |p| p.stock().value());
            if available < line.quantity {
                let name = product.as_ref().map_or_else(|| line.product_id.to_string(), |p| p.name().to_string());
                return Err(shortage(name, line.product_id, line.quantity, available));
            }
            if let Some(product) = product {
                priced.push((product, line.quantity));
            }
        }

        let (mut order, items) = Order::place(user_id, shipping, &priced)?;
        self.repo.place_order(&order, &items).await.map_err(|e| match e {
            RepositoryError::InsufficientStock { product_id, requested, available } => {
                let name = priced
                    .iter()
                    .find(|(p, _)| p.id() == product_id)
                    .map_or_else(|| product_id.to_string(), |(p, _)| p.name().to_string());
                shortage(name, product_id, requested, available.unwrap_or(0))
            }
            other => CheckoutError::Repository(other),
        })?;

        tracing::info!(order_id = %order.id(), user_id = %user_id, total = %order.total(), items = items.len(), "order placed");
        publish_all(self.events.as_ref(), order.take_events()).await;
        Ok(order)
    }
}

/// Folds repeated products into one line, keeping first-seen order.
fn merge_lines(lines: &[CheckoutLine]) -> Result<Vec<CheckoutLine>, CheckoutError> {
    let mut merged: Vec<CheckoutLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            return Err(OrderError::InvalidQuantity.into());
        }
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(m) => m.quantity = m.quantity.checked_add(line.quantity).ok_or(OrderError::InvalidQuantity)?,
            None => merged.push(*line),
        }
    }
    Ok(merged)
}

fn shortage(product: String, product_id: ProductId, requested: u32, available: u32) -> CheckoutError {
    tracing::warn!(%product_id, requested, available, "checkout rejected for insufficient stock");
    CheckoutError::StockShortage { product, requested, available }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::aggregates::OrderStatus;
    use crate::domain::value_objects::{OrderId, Stock};
    use crate::listing::OrderQuery;
    use crate::publisher::recording::RecordingPublisher;
    use crate::repository::fixtures::product;
    use crate::repository::InMemoryRepository;

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            first_name: "Ana".into(),
            last_name: "Horvat".into(),
            address: "Ilica 1, Zagreb".into(),
            phone: "+385 1 234".into(),
        }
    }

    fn entry(p: &Product, quantity: u32) -> CheckoutLine { CheckoutLine { product_id: p.id(), quantity } }

    async fn setup() -> (Arc<InMemoryRepository>, Arc<RecordingPublisher>, CheckoutService) {
        let repo = Arc::new(InMemoryRepository::new());
        let events = Arc::new(RecordingPublisher::default());
        let service = CheckoutService::new(repo.clone(), events.clone());
        (repo, events, service)
    }

    #[tokio::test]
    async fn test_checkout_writes_order_items_and_stock() {
        let (repo, events, service) = setup().await;
        let a = product("A", 1000, 5);
        let b = product("B", 500, 1);
        repo.insert_product(&a).await.unwrap();
        repo.insert_product(&b).await.unwrap();

        let order = service.place_order(UserId::new(), &shipping(), &[entry(&a, 2), entry(&b, 1)]).await.unwrap();

        assert_eq!(order.total(), Decimal::new(2500, 2));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.shipping().first_name, "Ana");
        let items = repo.order_items(order.id()).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(repo.get_product(a.id()).await.unwrap().unwrap().stock(), Stock::new(3));
        assert_eq!(repo.get_product(b.id()).await.unwrap().unwrap().stock(), Stock::new(0));
        assert_eq!(events.subjects(), vec!["techstore.order.placed"]);
    }

    #[tokio::test]
    async fn test_shortage_aborts_before_any_write() {
        let (repo, events, service) = setup().await;
        let a = product("A", 1000, 5);
        let b = product("Camera", 500, 1);
        repo.insert_product(&a).await.unwrap();
        repo.insert_product(&b).await.unwrap();

        let err = service.place_order(UserId::new(), &shipping(), &[entry(&a, 2), entry(&b, 2)]).await.unwrap_err();

        match err {
            CheckoutError::StockShortage { product, requested, available } => {
                assert_eq!(product, "Camera");
                assert_eq!((requested, available), (2, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(repo.list_orders(&OrderQuery::default()).await.unwrap().total, 0);
        assert_eq!(repo.get_product(a.id()).await.unwrap().unwrap().stock(), Stock::new(5));
        assert!(events.subjects().is_empty());
    }

    #[tokio::test]
    async fn test_removed_product_is_a_shortage() {
        let (_, _, service) = setup().await;
        let ghost = product("Ghost", 100, 3);
        let err = service.place_order(UserId::new(), &shipping(), &[entry(&ghost, 1)]).await.unwrap_err();
        assert!(matches!(err, CheckoutError::StockShortage { available: 0, .. }));
    }

    #[tokio::test]
    async fn test_order_is_priced_from_catalog() {
        let (repo, _, service) = setup().await;
        let camera = product("Camera", 99900, 5);
        repo.insert_product(&camera).await.unwrap();

        let order = service.place_order(UserId::new(), &shipping(), &[entry(&camera, 2)]).await.unwrap();

        assert_eq!(order.total(), Decimal::new(199800, 2));
        let items = repo.order_items(order.id()).await.unwrap();
        assert_eq!(items[0].price.amount(), Decimal::new(99900, 2));
    }

    #[tokio::test]
    async fn test_repeated_lines_are_checked_together() {
        let (repo, events, service) = setup().await;
        let lens = product("Lens", 25000, 3);
        repo.insert_product(&lens).await.unwrap();

        let err = service.place_order(UserId::new(), &shipping(), &[entry(&lens, 2), entry(&lens, 2)]).await.unwrap_err();

        match err {
            CheckoutError::StockShortage { product, requested, available } => {
                assert_eq!(product, "Lens");
                assert_eq!((requested, available), (4, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(repo.get_product(lens.id()).await.unwrap().unwrap().stock(), Stock::new(3));
        assert_eq!(repo.list_orders(&OrderQuery::default()).await.unwrap().total, 0);
        assert!(events.subjects().is_empty());

        let order = service.place_order(UserId::new(), &shipping(), &[entry(&lens, 1), entry(&lens, 2)]).await.unwrap();
        let items = repo.order_items(order.id()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(repo.get_product(lens.id()).await.unwrap().unwrap().stock(), Stock::new(0));
    }

    #[tokio::test]
    async fn test_quantity_overflow_is_rejected() {
        let (repo, _, service) = setup().await;
        let lens = product("Lens", 25000, 3);
        repo.insert_product(&lens).await.unwrap();

        let err = service.place_order(UserId::new(), &shipping(), &[entry(&lens, u32::MAX), entry(&lens, 2)]).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Order(OrderError::InvalidQuantity)));
        assert_eq!(repo.get_product(lens.id()).await.unwrap().unwrap().stock(), Stock::new(3));
    }

    #[tokio::test]
    async fn test_validation_runs_first() {
        let (repo, _, service) = setup().await;
        let a = product("A", 1000, 5);
        repo.insert_product(&a).await.unwrap();

        assert!(matches!(service.place_order(UserId::new(), &shipping(), &[]).await, Err(CheckoutError::EmptyCart)));

        let blank = ShippingDetails { phone: "   ".into(), ..shipping() };
        let err = service.place_order(UserId::new(), &blank, &[entry(&a, 1)]).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidShipping(_)));
        assert!(repo.get_order(OrderId::new()).await.unwrap().is_none());
        assert_eq!(repo.get_product(a.id()).await.unwrap().unwrap().stock(), Stock::new(5));
    }
}
