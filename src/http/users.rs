//! User administration handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::domain::aggregates::User;
use crate::domain::value_objects::{Role, UserId};
use crate::http::error::Result;
use crate::http::guard::AdminUser;
use crate::http::paged;
use crate::http::state::AppState;
use crate::listing::{search_term, Direction, PageRequest, Sort, UserFilter, UserQuery, UserSort, ADMIN_PAGE_SIZE};

#[derive(Debug, Default, Deserialize)]
pub struct UserParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub sort: Option<UserSort>,
    pub direction: Option<Direction>,
}

impl From<UserParams> for UserQuery {
    fn from(p: UserParams) -> Self {
        Self {
            filter: UserFilter { search: search_term(p.search.as_deref()) },
            sort: Sort::new(p.sort.unwrap_or_default(), p.direction.unwrap_or_default()),
            page: PageRequest::new(p.page.unwrap_or(1), p.per_page.unwrap_or(ADMIN_PAGE_SIZE)),
        }
    }
}

pub async fn list_users(State(s): State<AppState>, AdminUser(_): AdminUser, Query(p): Query<UserParams>) -> Result<Response> {
    Ok(paged(s.accounts.list(&p.into()).await?))
}

pub async fn get_user(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<UserId>) -> Result<Json<User>> {
    Ok(Json(s.accounts.get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: Role,
}

pub async fn set_role(
    State(s): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<UserId>,
    Json(change): Json<RoleChange>,
) -> Result<Json<User>> {
    Ok(Json(s.accounts.set_role(admin.id, id, change.role).await?))
}

pub async fn delete_user(
    State(s): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    s.accounts.delete(admin.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
