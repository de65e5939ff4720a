use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{wanted_stock, OrderRepository, ProductRepository, RepositoryError, UserRepository};
use crate::domain::aggregates::{Order, OrderItem, OrderStatus, Product, User};
use crate::domain::value_objects::{Email, OrderId, ProductId, Stock, UserId};
use crate::listing::{
    contains_ci, paginate, OrderQuery, OrderSort, Page, ProductQuery, ProductSort, UserQuery, UserSort,
};

/// Process-local backend. One write lock covers a whole order placement.
#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    items: Vec<OrderItem>,
    users: HashMap<UserId, User>,
}

impl InMemoryRepository {
    pub fn new() -> Self { Self::default() }
}

fn stored_product(p: &Product) -> Product {
    let mut p = p.clone();
    p.take_events();
    p
}

fn stored_order(o: &Order) -> Order {
    let mut o = o.clone();
    o.take_events();
    o
}

fn compare_products(a: &Product, b: &Product, key: ProductSort) -> Ordering {
    let primary = match key {
        ProductSort::Id => Ordering::Equal,
        ProductSort::Name => a.name().cmp(b.name()),
        ProductSort::Brand => a.brand().cmp(b.brand()),
        ProductSort::Category => a.category().as_str().cmp(b.category().as_str()),
        ProductSort::Price => a.price().cmp(&b.price()),
        ProductSort::Stock => a.stock().cmp(&b.stock()),
        ProductSort::CreatedAt => a.created_at().cmp(&b.created_at()),
    };
    primary.then_with(|| a.id().cmp(&b.id()))
}

fn compare_orders(a: &Order, b: &Order, key: OrderSort) -> Ordering {
    let primary = match key {
        OrderSort::Id => Ordering::Equal,
        OrderSort::Total => a.total().cmp(&b.total()),
        OrderSort::Status => a.status().as_str().cmp(b.status().as_str()),
        OrderSort::CreatedAt => a.created_at().cmp(&b.created_at()),
    };
    primary.then_with(|| a.id().cmp(&b.id()))
}

fn compare_users(a: &User, b: &User, key: UserSort) -> Ordering {
    let primary = match key {
        UserSort::Id => Ordering::Equal,
        UserSort::FirstName => a.first_name.cmp(&b.first_name),
        UserSort::LastName => a.last_name.cmp(&b.last_name),
        UserSort::Email => a.email.as_str().cmp(b.email.as_str()),
        UserSort::Role => a.role.as_str().cmp(b.role.as_str()),
        UserSort::CreatedAt => a.created_at.cmp(&b.created_at),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl ProductRepository for InMemoryRepository {
    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError> {
        let state = self.state.read().await;
        let f = &query.filter;
        let mut rows: Vec<Product> = state
            .products
            .values()
            .filter(|p| f.brand.as_deref().map_or(true, |b| p.brand() == b))
            .filter(|p| f.category.map_or(true, |c| p.category() == c))
            .filter(|p| f.name.as_deref().map_or(true, |n| contains_ci(p.name(), n)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| query.sort.direction.apply(compare_products(a, b, query.sort.key)));
        Ok(paginate(rows, query.page))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.products.contains_key(&product.id()) {
            return Err(RepositoryError::Conflict(format!("product {} already exists", product.id())));
        }
        state.products.insert(product.id(), stored_product(product));
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let current = state.products.get(&product.id()).ok_or(RepositoryError::NotFound)?;
        let mut next = stored_product(product);
        next.set_stock(current.stock());
        next.take_events();
        state.products.insert(product.id(), next);
        Ok(())
    }

    async fn set_stock(&self, id: ProductId, stock: Stock) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let product = state.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        product.set_stock(stock);
        product.take_events();
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        self.state.write().await.products.remove(&id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepository {
    async fn place_order(&self, order: &Order, items: &[OrderItem]) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;

        let wanted = wanted_stock(items)?;
        for (product_id, requested) in &wanted {
            let product = state.products.get(product_id);
            let available = product.map(|p| p.stock().value());
            if available.map_or(true, |a| a < *requested) {
                return Err(RepositoryError::InsufficientStock { product_id: *product_id, requested: *requested, available });
            }
        }
        for item in items {
            if state.products.get(&item.product_id).is_some_and(|p| p.price() != item.price) {
                return Err(RepositoryError::PriceChanged { product_id: item.product_id });
            }
        }

        for (product_id, requested) in wanted {
            if let Some(product) = state.products.get_mut(&product_id) {
                product
                    .remove_stock(requested)
                    .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
                product.take_events();
            }
        }
        state.orders.insert(order.id(), stored_order(order));
        state.items.extend(items.iter().cloned());
        Ok(())
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>, RepositoryError> {
        let state = self.state.read().await;
        let f = &query.filter;
        let mut rows: Vec<Order> = state
            .orders
            .values()
            .filter(|o| f.user_id.map_or(true, |u| o.user_id() == u))
            .filter(|o| f.status.map_or(true, |s| o.status() == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| query.sort.direction.apply(compare_orders(a, b, query.sort.key)));
        Ok(paginate(rows, query.page))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.items.iter().filter(|i| i.order_id == order_id).cloned().collect())
    }

    async fn item_counts(&self, order_ids: &[OrderId]) -> Result<HashMap<OrderId, u32>, RepositoryError> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for item in state.items.iter().filter(|i| order_ids.contains(&i.order_id)) {
            *counts.entry(item.order_id).or_insert(0) += item.quantity;
        }
        Ok(counts)
    }

    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let current = state.orders.get(&id).ok_or(RepositoryError::NotFound)?;
        let updated = Order::restore(
            current.id(), current.user_id(), current.total(), status, current.shipping().clone(), current.created_at(),
        );
        state.orders.insert(id, updated);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, RepositoryError> {
        let state = self.state.read().await;
        let term = query.filter.search.as_deref().unwrap_or("");
        let mut rows: Vec<User> = state
            .users
            .values()
            .filter(|u| {
                contains_ci(&u.first_name, term) || contains_ci(&u.last_name, term) || contains_ci(u.email.as_str(), term)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| query.sort.direction.apply(compare_users(a, b, query.sort.key)));
        Ok(paginate(rows, query.page))
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.values().find(|u| &u.email == email).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let current = state.users.get_mut(&user.id).ok_or(RepositoryError::NotFound)?;
        current.first_name.clone_from(&user.first_name);
        current.last_name.clone_from(&user.last_name);
        current.phone.clone_from(&user.phone);
        current.address.clone_from(&user.address);
        current.role = user.role;
        current.password_hash.clone_from(&user.password_hash);
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        if state.orders.values().any(|o| o.user_id() == id) {
            return Err(RepositoryError::Conflict("user still has orders".to_owned()));
        }
        state.users.remove(&id);
        Ok(())
    }
}
