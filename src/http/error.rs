//! One error type for every handler, mapped to a status code and a JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::accounts::AccountsError;
use crate::auth::AuthError;
use crate::catalog::CatalogError;
use crate::checkout::CheckoutError;
use crate::contact::ContactError;
use crate::domain::aggregates::OrderError;
use crate::images::ImageError;
use crate::orders::OrdersError;
use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Orders error: {0}")]
    Orders(#[from] OrdersError),
    #[error("Accounts error: {0}")]
    Accounts(#[from] AccountsError),
    #[error("Contact error: {0}")]
    Contact(#[from] ContactError),
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

fn repository_status(e: &RepositoryError) -> StatusCode {
    match e {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) | RepositoryError::InsufficientStock { .. } | RepositoryError::PriceChanged { .. } => {
            StatusCode::CONFLICT
        }
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(e) => match e {
                AuthError::Validation(_)
                | AuthError::Invalid(_)
                | AuthError::PasswordMismatch
                | AuthError::PasswordUnchanged
                | AuthError::IncorrectPassword => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
                AuthError::Repository(e) => repository_status(e),
            },
            Self::Checkout(e) => match e {
                CheckoutError::EmptyCart | CheckoutError::InvalidShipping(_) | CheckoutError::Order(_) => {
                    StatusCode::BAD_REQUEST
                }
                CheckoutError::StockShortage { .. } => StatusCode::CONFLICT,
                CheckoutError::Repository(e) => repository_status(e),
            },
            Self::Catalog(e) => match e {
                CatalogError::Invalid(_) | CatalogError::Image(ImageError::InvalidFilename(_) | ImageError::Empty) => {
                    StatusCode::BAD_REQUEST
                }
                CatalogError::NotFound => StatusCode::NOT_FOUND,
                CatalogError::Image(ImageError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
                CatalogError::Repository(e) => repository_status(e),
            },
            Self::Orders(e) => match e {
                OrdersError::NotFound => StatusCode::NOT_FOUND,
                OrdersError::Order(OrderError::CannotCancel) => StatusCode::CONFLICT,
                OrdersError::Order(_) => StatusCode::BAD_REQUEST,
                OrdersError::Repository(e) => repository_status(e),
            },
            Self::Accounts(e) => match e {
                AccountsError::NotFound => StatusCode::NOT_FOUND,
                AccountsError::Invalid(_) => StatusCode::BAD_REQUEST,
                AccountsError::OwnAccount | AccountsError::HasOrders => StatusCode::CONFLICT,
                AccountsError::Repository(e) => repository_status(e),
            },
            Self::Contact(e) => match e {
                ContactError::Validation(_) => StatusCode::BAD_REQUEST,
                ContactError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                ContactError::Upstream(_) | ContactError::Transport(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Repository(e) => repository_status(e),
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Client-facing message. Server-side failures are not described.
    pub fn message(&self) -> String {
        let status = self.status();
        if status.is_server_error() {
            return match status {
                StatusCode::BAD_GATEWAY => "External service error".to_string(),
                StatusCode::SERVICE_UNAVAILABLE => "Contact form is not available".to_string(),
                _ => "Internal server error".to_string(),
            };
        }
        match self {
            Self::Auth(e) => e.to_string(),
            Self::Checkout(e) => e.to_string(),
            Self::Catalog(e) => e.to_string(),
            Self::Orders(e) => e.to_string(),
            Self::Accounts(e) => e.to_string(),
            Self::Contact(e) => e.to_string(),
            Self::Repository(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Repository(e) => e.to_string(),
            Self::Unauthorized(m) | Self::Forbidden(m) | Self::BadRequest(m) => m.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request error");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
