use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{wanted_stock, OrderRepository, ProductRepository, RepositoryError, UserRepository};
use crate::domain::aggregates::{Order, OrderItem, OrderStatus, Product, ShippingDetails, User};
use crate::domain::value_objects::{
    Email, OrderId, OrderItemId, Price, ProductId, Stock, UserId,
};
use crate::listing::{
    Direction, OrderFilter, OrderQuery, Page, PageRequest, ProductFilter, ProductQuery, SortKey, UserFilter,
    UserQuery,
};

const PRODUCT_COLUMNS: &str = "id, name, brand, category, price, description, image_filename, stock, created_at";
const ORDER_COLUMNS: &str = "id, user_id, total, status, first_name, last_name, address, phone, created_at";
const USER_COLUMNS: &str = "id, first_name, last_name, email, phone, address, role, password_hash, created_at";

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    brand: String,
    category: String,
    price: Decimal,
    description: String,
    image_filename: String,
    stock: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;
    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product::restore(
            ProductId::from_uuid(r.id), r.name, r.brand, r.category.parse()?, Price::new(r.price)?,
            r.description, r.image_filename, Stock::try_from(r.stock)?, r.created_at,
        ))
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total: Decimal,
    status: String,
    first_name: String,
    last_name: String,
    address: String,
    phone: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;
    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let shipping = ShippingDetails { first_name: r.first_name, last_name: r.last_name, address: r.address, phone: r.phone };
        Ok(Order::restore(OrderId::from_uuid(r.id), UserId::from_uuid(r.user_id), r.total, r.status.parse()?, shipping, r.created_at))
    }
}

#[derive(FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    price: Decimal,
    quantity: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;
    fn try_from(r: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(r.quantity)
            .map_err(|_| RepositoryError::DataCorruption(format!("order item {} has quantity {}", r.id, r.quantity)))?;
        Ok(OrderItem {
            id: OrderItemId::from_uuid(r.id),
            order_id: OrderId::from_uuid(r.order_id),
            product_id: ProductId::from_uuid(r.product_id),
            price: Price::new(r.price)?,
            quantity,
        })
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    address: String,
    role: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;
    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from_uuid(r.id),
            first_name: r.first_name,
            last_name: r.last_name,
            email: Email::parse(&r.email)?,
            phone: r.phone,
            address: r.address,
            role: r.role.parse()?,
            created_at: r.created_at,
            password_hash: r.password_hash,
        })
    }
}

fn to_i32(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|_| RepositoryError::Conflict(format!("{value} is out of range")))
}

fn to_i64(value: u64) -> i64 { i64::try_from(value).unwrap_or(i64::MAX) }

/// `%term%` with LIKE metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_order_by<K: SortKey>(qb: &mut QueryBuilder<'_, Postgres>, key: K, direction: Direction) {
    let dir = direction.sql();
    qb.push(" ORDER BY ").push(key.column()).push(" ").push(dir);
    if key.column() != "id" {
        qb.push(", id ").push(dir);
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: PageRequest) {
    qb.push(" LIMIT ").push_bind(to_i64(page.limit())).push(" OFFSET ").push_bind(to_i64(page.offset()));
}

fn push_product_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &ProductFilter) {
    qb.push(" WHERE TRUE");
    if let Some(brand) = &f.brand {
        qb.push(" AND brand = ").push_bind(brand.clone());
    }
    if let Some(category) = f.category {
        qb.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(name) = &f.name {
        qb.push(" AND name ILIKE ").push_bind(like_pattern(name));
    }
}

fn push_order_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(user_id) = f.user_id {
        qb.push(" AND user_id = ").push_bind(user_id.as_uuid());
    }
    if let Some(status) = f.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

fn push_user_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &UserFilter) {
    qb.push(" WHERE TRUE");
    if let Some(term) = &f.search {
        let pattern = like_pattern(term);
        qb.push(" AND (first_name ILIKE ").push_bind(pattern.clone())
            .push(" OR last_name ILIKE ").push_bind(pattern.clone())
            .push(" OR email ILIKE ").push_bind(pattern)
            .push(")");
    }
}

impl PgRepository {
    /// Runs a listing that selects `COUNT(*) OVER() AS total_count`. An empty
    /// page carries no count, so `count` is consulted only then.
    async fn fetch_page<R, T>(
        &self,
        mut listing: QueryBuilder<'_, Postgres>,
        mut count: QueryBuilder<'_, Postgres>,
        page: PageRequest,
    ) -> Result<Page<T>, RepositoryError>
    where
        R: for<'r> FromRow<'r, PgRow>,
        T: TryFrom<R, Error = RepositoryError>,
    {
        let rows: Vec<PgRow> = listing.build().fetch_all(&self.pool).await?;
        let total: i64 = match rows.first() {
            Some(row) => row.try_get("total_count")?,
            None => count.build_query_scalar::<i64>().fetch_one(&self.pool).await?,
        };
        let data = rows
            .iter()
            .map(|row| R::from_row(row).map_err(RepositoryError::from).and_then(T::try_from))
            .collect::<Result<Vec<T>, _>>()?;
        Ok(Page::new(data, u64::try_from(total).unwrap_or_default(), page))
    }
}

#[async_trait]
impl ProductRepository for PgRepository {
    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError> {
        let mut listing = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS}, COUNT(*) OVER() AS total_count FROM products"));
        push_product_filter(&mut listing, &query.filter);
        push_order_by(&mut listing, query.sort.key, query.sort.direction);
        push_page(&mut listing, query.page);
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM products");
        push_product_filter(&mut count, &query.filter);
        self.fetch_page::<ProductRow, Product>(listing, count, query.page).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid()).fetch_optional(&self.pool).await?
            .map(Product::try_from).transpose()
    }

    async fn insert_product(&self, p: &Product) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO products (id, name, brand, category, price, description, image_filename, stock, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
            .bind(p.id().as_uuid()).bind(p.name()).bind(p.brand()).bind(p.category().as_str()).bind(p.price().amount())
            .bind(p.description()).bind(p.image_filename()).bind(to_i32(p.stock().value())?).bind(p.created_at())
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn update_product(&self, p: &Product) -> Result<(), RepositoryError> {
        let done = sqlx::query("UPDATE products SET name = $2, brand = $3, category = $4, price = $5, description = $6, image_filename = $7 WHERE id = $1")
            .bind(p.id().as_uuid()).bind(p.name()).bind(p.brand()).bind(p.category().as_str()).bind(p.price().amount())
            .bind(p.description()).bind(p.image_filename())
            .execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound); }
        Ok(())
    }

    async fn set_stock(&self, id: ProductId, stock: Stock) -> Result<(), RepositoryError> {
        let done = sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(id.as_uuid()).bind(to_i32(stock.value())?).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound); }
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM products WHERE id = $1").bind(id.as_uuid()).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound); }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgRepository {
    async fn place_order(&self, order: &Order, items: &[OrderItem]) -> Result<(), RepositoryError> {
        let wanted = wanted_stock(items)?;

        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool.begin().await?;

        let mut prices: HashMap<ProductId, Decimal> = HashMap::with_capacity(wanted.len());
        for (product_id, requested) in &wanted {
            let row: Option<(i32, Decimal)> = sqlx::query_as("SELECT stock, price FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id.as_uuid()).fetch_optional(&mut *tx).await?;
            let available = row.map(|(s, _)| u32::try_from(s).unwrap_or_default());
            if available.map_or(true, |a| a < *requested) {
                return Err(RepositoryError::InsufficientStock { product_id: *product_id, requested: *requested, available });
            }
            if let Some((_, price)) = row {
                prices.insert(*product_id, price);
            }
        }
        // Items must carry the price of the rows just locked.
        if let Some(item) = items.iter().find(|i| prices.get(&i.product_id).is_some_and(|p| *p != i.price.amount())) {
            return Err(RepositoryError::PriceChanged { product_id: item.product_id });
        }

        let s = order.shipping();
        sqlx::query("INSERT INTO orders (id, user_id, total, status, first_name, last_name, address, phone, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
            .bind(order.id().as_uuid()).bind(order.user_id().as_uuid()).bind(order.total()).bind(order.status().as_str())
            .bind(&s.first_name).bind(&s.last_name).bind(&s.address).bind(&s.phone).bind(order.created_at())
            .execute(&mut *tx).await?;

        if !items.is_empty() {
            let mut quantities = Vec::with_capacity(items.len());
            for item in items {
                quantities.push(to_i32(item.quantity)?);
            }
            let mut insert = QueryBuilder::<Postgres>::new("INSERT INTO order_items (id, order_id, product_id, price, quantity) ");
            insert.push_values(items.iter().zip(quantities), |mut b, (item, qty)| {
                b.push_bind(item.id.as_uuid())
                    .push_bind(item.order_id.as_uuid())
                    .push_bind(item.product_id.as_uuid())
                    .push_bind(item.price.amount())
                    .push_bind(qty);
            });
            insert.build().execute(&mut *tx).await?;
        }

        for (product_id, requested) in wanted {
            let done = sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
                .bind(product_id.as_uuid()).bind(to_i32(requested)?)
                .execute(&mut *tx).await?;
            if done.rows_affected() == 0 {
                return Err(RepositoryError::InsufficientStock { product_id, requested, available: None });
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>, RepositoryError> {
        let mut listing = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS}, COUNT(*) OVER() AS total_count FROM orders"));
        push_order_filter(&mut listing, &query.filter);
        push_order_by(&mut listing, query.sort.key, query.sort.direction);
        push_page(&mut listing, query.page);
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM orders");
        push_order_filter(&mut count, &query.filter);
        self.fetch_page::<OrderRow, Order>(listing, count, query.page).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid()).fetch_optional(&self.pool).await?
            .map(Order::try_from).transpose()
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        sqlx::query_as::<_, OrderItemRow>("SELECT id, order_id, product_id, price, quantity FROM order_items WHERE order_id = $1 ORDER BY id")
            .bind(order_id.as_uuid()).fetch_all(&self.pool).await?
            .into_iter().map(OrderItem::try_from).collect()
    }

    async fn item_counts(&self, order_ids: &[OrderId]) -> Result<HashMap<OrderId, u32>, RepositoryError> {
        if order_ids.is_empty() { return Ok(HashMap::new()); }
        let ids: Vec<Uuid> = order_ids.iter().map(OrderId::as_uuid).collect();
        let rows: Vec<(Uuid, i64)> = sqlx::query_as("SELECT order_id, SUM(quantity)::BIGINT FROM order_items WHERE order_id = ANY($1) GROUP BY order_id")
            .bind(ids).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(id, units)| (OrderId::from_uuid(id), u32::try_from(units).unwrap_or(u32::MAX)))
            .collect())
    }

    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<(), RepositoryError> {
        let done = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_uuid()).bind(status.as_str()).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound); }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgRepository {
    async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, RepositoryError> {
        let mut listing = QueryBuilder::new(format!("SELECT {USER_COLUMNS}, COUNT(*) OVER() AS total_count FROM users"));
        push_user_filter(&mut listing, &query.filter);
        push_order_by(&mut listing, query.sort.key, query.sort.direction);
        push_page(&mut listing, query.page);
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_user_filter(&mut count, &query.filter);
        self.fetch_page::<UserRow, User>(listing, count, query.page).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid()).fetch_optional(&self.pool).await?
            .map(User::try_from).transpose()
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = $1"))
            .bind(email.as_str()).fetch_optional(&self.pool).await?
            .map(User::try_from).transpose()
    }

    async fn insert_user(&self, u: &User) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO users (id, first_name, last_name, email, phone, address, role, password_hash, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
            .bind(u.id.as_uuid()).bind(&u.first_name).bind(&u.last_name).bind(u.email.as_str()).bind(&u.phone)
            .bind(&u.address).bind(u.role.as_str()).bind(&u.password_hash).bind(u.created_at)
            .execute(&self.pool).await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db) = e {
                    if db.is_unique_violation() {
                        return RepositoryError::Conflict("email already exists".to_owned());
                    }
                }
                RepositoryError::Database(e)
            })?;
        Ok(())
    }

    async fn update_user(&self, u: &User) -> Result<(), RepositoryError> {
        let done = sqlx::query("UPDATE users SET first_name = $2, last_name = $3, phone = $4, address = $5, role = $6, password_hash = $7 WHERE id = $1")
            .bind(u.id.as_uuid()).bind(&u.first_name).bind(&u.last_name).bind(&u.phone).bind(&u.address)
            .bind(u.role.as_str()).bind(&u.password_hash)
            .execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound); }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid()).execute(&self.pool).await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db) = e {
                    if db.is_foreign_key_violation() {
                        return RepositoryError::Conflict("user still has orders".to_owned());
                    }
                }
                RepositoryError::Database(e)
            })?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound); }
        Ok(())
    }
}
