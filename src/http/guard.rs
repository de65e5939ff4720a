//! Bearer-token extractors.
//!
//! `AuthUser` resolves the `Authorization: Bearer <token>` header against the
//! token store and rejects with 401. `AdminUser` and `ClientUser` add a role
//! check on top and reject with 403.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::domain::aggregates::User;
use crate::domain::value_objects::Role;
use crate::http::error::AppError;
use crate::http::state::AppState;

/// Any signed-in user, plus the token the request carried.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

pub struct AdminUser(pub User);

pub struct ClientUser(pub User);

pub(crate) fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))?;
        let user = state.auth.authenticate(token).await?;
        Ok(Self { user, token: token.to_string() })
    }
}

async fn with_role(parts: &mut Parts, state: &AppState, role: Role) -> Result<User, AppError> {
    let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;
    if user.role != role {
        tracing::debug!(user_id = %user.id, required = %role, "role check failed");
        return Err(AppError::Forbidden(format!("{role} access required")));
    }
    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        with_role(parts, state, Role::Admin).await.map(Self)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ClientUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        with_role(parts, state, Role::Client).await.map(Self)
    }
}
