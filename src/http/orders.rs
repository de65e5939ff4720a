//! Checkout, customer order history and order administration handlers.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{CheckoutLine, Order, OrderStatus, ShippingDetails};
use crate::domain::value_objects::OrderId;
use crate::http::error::{AppError, Result};
use crate::http::guard::{AdminUser, AuthUser, ClientUser};
use crate::http::paged;
use crate::http::state::AppState;
use crate::listing::{search_term, Direction, OrderFilter, OrderQuery, OrderSort, PageRequest, Sort, DEFAULT_PAGE_SIZE};
use crate::orders::OrderDetail;

/// Cart lines and shipping form submitted at checkout. Prices are looked up
/// server-side; any price sent along with a line is ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLine>,
    pub shipping: ShippingDetails,
}

pub async fn checkout(
    State(s): State<AppState>,
    ClientUser(user): ClientUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = s.checkout.place_order(user.id, &req.shipping, &req.items).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
    pub sort: Option<OrderSort>,
    pub direction: Option<Direction>,
}

impl OrderParams {
    fn into_query(self) -> Result<OrderQuery> {
        let status = search_term(self.status.as_deref())
            .map(|s| OrderStatus::from_str(&s))
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(OrderQuery {
            filter: OrderFilter { user_id: None, status },
            sort: Sort::new(self.sort.unwrap_or_default(), self.direction.unwrap_or_default()),
            page: PageRequest::new(self.page.unwrap_or(1), self.per_page.unwrap_or(DEFAULT_PAGE_SIZE)),
        })
    }
}

pub async fn my_orders(State(s): State<AppState>, auth: AuthUser, Query(p): Query<OrderParams>) -> Result<Response> {
    let query = p.into_query()?;
    Ok(paged(s.orders.list_for_user(auth.user.id, &query).await?))
}

pub async fn my_order(State(s): State<AppState>, auth: AuthUser, Path(id): Path<OrderId>) -> Result<Json<OrderDetail>> {
    Ok(Json(s.orders.detail_for_user(auth.user.id, id).await?))
}

pub async fn list_orders(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Query(p): Query<OrderParams>,
) -> Result<Response> {
    let query = p.into_query()?;
    Ok(paged(s.orders.list(&query).await?))
}

pub async fn get_order(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(s.orders.detail(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

pub async fn change_status(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<OrderId>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Order>> {
    Ok(Json(s.orders.change_status(id, change.status).await?))
}
