//! HTTP API.
//!
//! Everything lives under `/api/v1` except `/health` and the static
//! `/images` directory. Listing endpoints answer with a [`Page`] body and
//! mirror its total in an `X-Total-Count` header.

mod auth;
mod error;
mod guard;
mod orders;
mod products;
mod state;
mod users;

pub use error::{AppError, Result};
pub use guard::{AdminUser, AuthUser, ClientUser};
pub use orders::CheckoutRequest;
pub use state::AppState;

use std::path::Path;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::contact::ContactMessage;
use crate::listing::Page;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Upper bound on request bodies, sized for product image uploads.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub(crate) fn paged<T: Serialize>(page: Page<T>) -> Response {
    ([(TOTAL_COUNT_HEADER, page.total.to_string())], Json(page)).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "techstore" }))
}

async fn contact(State(s): State<AppState>, Json(message): Json<ContactMessage>) -> Result<StatusCode> {
    s.contact.send(&message).await?;
    Ok(StatusCode::ACCEPTED)
}

fn api() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/profile/password", put(auth::change_password))
        .route("/products", get(products::list_products).post(products::create_product))
        .route(
            "/products/:id",
            get(products::get_product).put(products::update_product).delete(products::delete_product),
        )
        .route("/checkout", post(orders::checkout))
        .route("/orders", get(orders::my_orders))
        .route("/orders/:id", get(orders::my_order))
        .route("/contact", post(contact))
        .route("/admin/inventory", get(products::list_inventory))
        .route("/admin/inventory/:id", put(products::set_stock))
        .route("/admin/orders", get(orders::list_orders))
        .route("/admin/orders/:id", get(orders::get_order))
        .route("/admin/orders/:id/status", put(orders::change_status))
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/:id", get(users::get_user).delete(users::delete_user))
        .route("/admin/users/:id/role", put(users::set_role))
}

/// Builds the application router. `image_dir`, when given, is served
/// read-only under `/images`.
pub fn router(state: AppState, image_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));
    if let Some(dir) = image_dir {
        app = app.nest_service("/images", ServeDir::new(dir));
    }
    app.layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}
