//! Sign-up, sign-in and own-profile handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::auth::{LoginRequest, PasswordChange, Registration};
use crate::domain::aggregates::{ProfileUpdate, User};
use crate::http::error::Result;
use crate::http::guard::AuthUser;
use crate::http::state::AppState;
use crate::session::Credential;

pub async fn register(State(s): State<AppState>, Json(form): Json<Registration>) -> Result<(StatusCode, Json<User>)> {
    let user = s.auth.register(&form).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(State(s): State<AppState>, Json(form): Json<LoginRequest>) -> Result<Json<Credential>> {
    Ok(Json(s.auth.login(&form).await?))
}

pub async fn logout(State(s): State<AppState>, auth: AuthUser) -> StatusCode {
    s.auth.logout(&auth.token).await;
    StatusCode::NO_CONTENT
}

pub async fn me(auth: AuthUser) -> Json<User> { Json(auth.user) }

pub async fn update_profile(
    State(s): State<AppState>,
    auth: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    Ok(Json(s.accounts.update_profile(auth.user.id, &update).await?))
}

pub async fn change_password(
    State(s): State<AppState>,
    auth: AuthUser,
    Json(form): Json<PasswordChange>,
) -> Result<StatusCode> {
    s.auth.change_password(auth.user.id, &form).await?;
    Ok(StatusCode::NO_CONTENT)
}
