//! Typed client for the storefront API.
//!
//! A [`StorefrontClient`] owns the client-held state: the [`StorageService`]
//! backings, the session-scoped [`CartStore`] and the [`SessionContext`]. The
//! signed-in access token is attached to every request. Any 401 answer clears
//! the stored credential.

mod checkout;
mod routes;

pub use checkout::{CheckoutFlow, CheckoutState};
pub use routes::{resolve, Access, Route};

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{LoginRequest, PasswordChange, Registration};
use crate::cart::{CartStore, CartStoreError};
use crate::catalog::{ImageUpload, ProductView};
use crate::contact::ContactMessage;
use crate::domain::aggregates::{CheckoutLine, Order, OrderStatus, ProductDraft, ProfileUpdate, ShippingDetails, User};
use crate::domain::value_objects::{OrderId, ProductId, Role, Stock, UserId};
use crate::http::CheckoutRequest;
use crate::listing::{OrderQuery, Page, PageRequest, ProductQuery, Sort, UserQuery};
use crate::orders::{OrderDetail, OrderSummary};
use crate::session::{Credential, SessionContext};
use crate::storage::{StorageError, StorageService};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("unable to connect: {0}")]
    Connection(#[source] reqwest::Error),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Cart(#[from] CartStoreError),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct StockUpdate {
    stock: i64,
}

#[derive(Serialize)]
struct StatusChange {
    status: OrderStatus,
}

#[derive(Serialize)]
struct RoleChange {
    role: Role,
}

type Params = Vec<(&'static str, String)>;

fn enum_param<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_value(value).ok()?.as_str().map(str::to_string)
}

fn push_listing<K: Serialize>(params: &mut Params, sort: &Sort<K>, page: &PageRequest) {
    params.extend(enum_param(&sort.key).map(|v| ("sort", v)));
    params.extend(enum_param(&sort.direction).map(|v| ("direction", v)));
    params.push(("page", page.page().to_string()));
    params.push(("per_page", page.per_page().to_string()));
}

fn product_params(query: &ProductQuery) -> Params {
    let mut params = Params::new();
    params.extend(query.filter.brand.clone().map(|v| ("brand", v)));
    params.extend(query.filter.category.map(|c| ("category", c.as_str().to_string())));
    params.extend(query.filter.name.clone().map(|v| ("name", v)));
    push_listing(&mut params, &query.sort, &query.page);
    params
}

fn order_params(query: &OrderQuery) -> Params {
    let mut params = Params::new();
    params.extend(query.filter.status.map(|s| ("status", s.as_str().to_string())));
    push_listing(&mut params, &query.sort, &query.page);
    params
}

fn user_params(query: &UserQuery) -> Params {
    let mut params = Params::new();
    params.extend(query.filter.search.clone().map(|v| ("search", v)));
    push_listing(&mut params, &query.sort, &query.page);
    params
}

fn product_form(draft: &ProductDraft, stock: Option<Stock>, image: Option<ImageUpload>) -> Form {
    let mut form = Form::new()
        .text("name", draft.name.clone())
        .text("brand", draft.brand.clone())
        .text("category", draft.category.as_str())
        .text("price", draft.price.to_string())
        .text("description", draft.description.clone());
    if let Some(stock) = stock {
        form = form.text("stock", stock.value().to_string());
    }
    if let Some(image) = image {
        form = form.part("image", Part::bytes(image.bytes).file_name(image.filename));
    }
    form
}

pub struct StorefrontClient {
    http: reqwest::Client,
    base_url: String,
    storage: StorageService,
    cart: CartStore,
    session: SessionContext,
}

impl StorefrontClient {
    /// `base_url` is the service root, e.g. `http://localhost:8083`.
    pub fn new(http: reqwest::Client, base_url: &str, storage: StorageService) -> Self {
        let cart = CartStore::new(storage.session.clone());
        let session = SessionContext::hydrate(storage.clone());
        Self { http, base_url: base_url.trim_end_matches('/').to_string(), storage, cart, session }
    }

    pub fn storage(&self) -> &StorageService { &self.storage }
    pub fn cart(&self) -> &CartStore { &self.cart }
    pub fn session(&self) -> &SessionContext { &self.session }

    /// Where navigating to `route` lands for the current session.
    pub fn resolve(&self, route: Route) -> Route { resolve(route, self.session.current().map(|c| c.role())) }

    fn url(&self, path: &str) -> String { format!("{}/api/v1{path}", self.base_url) }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let request = match self.session.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.map_err(ClientError::Connection)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
        };
        if status == StatusCode::UNAUTHORIZED {
            if self.session.is_signed_in() {
                tracing::info!("access token rejected, clearing credential");
                self.session.clear()?;
            }
            return Err(ClientError::Unauthorized(message));
        }
        tracing::debug!(status = status.as_u16(), %message, "api request failed");
        Err(ClientError::Api { status: status.as_u16(), message })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        self.execute(request).await?.json::<T>().await.map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Replaces the user snapshot inside the stored credential.
    fn remember_user(&self, user: &User) -> Result<(), ClientError> {
        if let Some(mut credential) = self.session.current() {
            if credential.user.id == user.id {
                credential.user = user.clone();
                self.session.set(Some(credential))?;
            }
        }
        Ok(())
    }

    pub async fn register(&self, form: &Registration) -> Result<User, ClientError> {
        self.send(self.http.post(self.url("/auth/register")).json(form)).await
    }

    pub async fn login(&self, form: &LoginRequest) -> Result<Credential, ClientError> {
        let credential: Credential = self.send(self.http.post(self.url("/auth/login")).json(form)).await?;
        self.session.set(Some(credential.clone()))?;
        tracing::info!(user_id = %credential.user.id, "signed in");
        Ok(credential)
    }

    /// Revokes the token server-side when possible; the local credential is
    /// cleared either way.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if self.session.is_signed_in() {
            if let Err(e) = self.execute(self.http.post(self.url("/auth/logout"))).await {
                tracing::warn!(error = %e, "server-side logout failed");
            }
        }
        self.session.clear()?;
        Ok(())
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        let user: User = self.send(self.http.get(self.url("/auth/me"))).await?;
        self.remember_user(&user)?;
        Ok(user)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ClientError> {
        let user: User = self.send(self.http.put(self.url("/profile")).json(update)).await?;
        self.remember_user(&user)?;
        Ok(user)
    }

    pub async fn change_password(&self, form: &PasswordChange) -> Result<(), ClientError> {
        self.execute(self.http.put(self.url("/profile/password")).json(form)).await?;
        Ok(())
    }

    pub async fn products(&self, query: &ProductQuery) -> Result<Page<ProductView>, ClientError> {
        self.send(self.http.get(self.url("/products")).query(&product_params(query))).await
    }

    pub async fn product(&self, id: ProductId) -> Result<ProductView, ClientError> {
        self.send(self.http.get(self.url(&format!("/products/{id}")))).await
    }

    /// Fetches the product and adds one unit of it to the cart.
    pub async fn add_to_cart(&self, id: ProductId) -> Result<ProductView, ClientError> {
        let view = self.product(id).await?;
        self.cart.add(&view.product)?;
        Ok(view)
    }

    /// Places an order for the whole cart and clears the cart on success.
    pub async fn checkout(&self, shipping: &ShippingDetails) -> Result<Order, ClientError> {
        let items = self.cart.get()?.entries().iter().map(CheckoutLine::from).collect();
        let request = CheckoutRequest { items, shipping: shipping.clone() };
        let order: Order = self.send(self.http.post(self.url("/checkout")).json(&request)).await?;
        // The order exists at this point; a stale cart must not turn it into a failure.
        if let Err(e) = self.cart.clear() {
            tracing::warn!(order_id = %order.id(), error = %e, "order placed but cart could not be cleared");
        }
        tracing::info!(order_id = %order.id(), "order placed");
        Ok(order)
    }

    pub async fn my_orders(&self, query: &OrderQuery) -> Result<Page<OrderSummary>, ClientError> {
        self.send(self.http.get(self.url("/orders")).query(&order_params(query))).await
    }

    pub async fn my_order(&self, id: OrderId) -> Result<OrderDetail, ClientError> {
        self.send(self.http.get(self.url(&format!("/orders/{id}")))).await
    }

    pub async fn contact(&self, message: &ContactMessage) -> Result<(), ClientError> {
        self.execute(self.http.post(self.url("/contact")).json(message)).await?;
        Ok(())
    }

    pub async fn create_product(&self, draft: &ProductDraft, stock: Stock, image: ImageUpload) -> Result<ProductView, ClientError> {
        let form = product_form(draft, Some(stock), Some(image));
        self.send(self.http.post(self.url("/products")).multipart(form)).await
    }

    pub async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
        image: Option<ImageUpload>,
    ) -> Result<ProductView, ClientError> {
        let form = product_form(draft, None, image);
        self.send(self.http.put(self.url(&format!("/products/{id}"))).multipart(form)).await
    }

    pub async fn delete_product(&self, id: ProductId) -> Result<(), ClientError> {
        self.execute(self.http.delete(self.url(&format!("/products/{id}")))).await?;
        Ok(())
    }

    pub async fn inventory(&self, query: &ProductQuery) -> Result<Page<ProductView>, ClientError> {
        self.send(self.http.get(self.url("/admin/inventory")).query(&product_params(query))).await
    }

    pub async fn set_stock(&self, id: ProductId, stock: i64) -> Result<ProductView, ClientError> {
        let url = self.url(&format!("/admin/inventory/{id}"));
        self.send(self.http.put(url).json(&StockUpdate { stock })).await
    }

    pub async fn orders(&self, query: &OrderQuery) -> Result<Page<OrderSummary>, ClientError> {
        self.send(self.http.get(self.url("/admin/orders")).query(&order_params(query))).await
    }

    pub async fn order(&self, id: OrderId) -> Result<OrderDetail, ClientError> {
        self.send(self.http.get(self.url(&format!("/admin/orders/{id}")))).await
    }

    pub async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, ClientError> {
        let url = self.url(&format!("/admin/orders/{id}/status"));
        self.send(self.http.put(url).json(&StatusChange { status })).await
    }

    pub async fn users(&self, query: &UserQuery) -> Result<Page<User>, ClientError> {
        self.send(self.http.get(self.url("/admin/users")).query(&user_params(query))).await
    }

    pub async fn user(&self, id: UserId) -> Result<User, ClientError> {
        self.send(self.http.get(self.url(&format!("/admin/users/{id}")))).await
    }

    pub async fn set_role(&self, id: UserId, role: Role) -> Result<User, ClientError> {
        let url = self.url(&format!("/admin/users/{id}/role"));
        self.send(self.http.put(url).json(&RoleChange { role })).await
    }

    pub async fn delete_user(&self, id: UserId) -> Result<(), ClientError> {
        self.execute(self.http.delete(self.url(&format!("/admin/users/{id}")))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Category;
    use crate::listing::{Direction, ProductFilter, ProductSort};

    #[test]
    fn test_product_params() {
        let query = ProductQuery {
            filter: ProductFilter { brand: Some("Canon".into()), category: Some(Category::Printers), name: None },
            sort: Sort::new(ProductSort::CreatedAt, Direction::Asc),
            page: PageRequest::new(3, 8),
        };
        assert_eq!(
            product_params(&query),
            vec![
                ("brand", "Canon".to_string()),
                ("category", "Printers".to_string()),
                ("sort", "created_at".to_string()),
                ("direction", "asc".to_string()),
                ("page", "3".to_string()),
                ("per_page", "8".to_string()),
            ]
        );
    }

    #[test]
    fn test_hydrated_session_is_used() {
        let storage = StorageService::ephemeral();
        let client = StorefrontClient::new(reqwest::Client::new(), "http://localhost:8083/", storage);
        assert_eq!(client.url("/products"), "http://localhost:8083/api/v1/products");
        assert!(!client.session().is_signed_in());
        assert_eq!(client.resolve(Route::Profile), Route::Login);
    }
}
