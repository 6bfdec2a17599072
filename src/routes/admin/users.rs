use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use serde::Deserialize;

use crate::auth::SessionUser;
use crate::db::operations::access_requests::looks_like_email;
use crate::db::operations::users::{self, NewUser, UserUpdate};
use crate::response::{message, ok, AppError};
use crate::routes::{json_body, path_id, require_db, required};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", put(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
struct ListUsersQuery {
    search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    email: Option<String>,
    password: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    role: Option<String>,
    organization: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    role: Option<String>,
    organization: Option<String>,
    is_active: Option<bool>,
}

fn normalize_role(role: Option<String>) -> Option<String> {
    role.map(|r| r.trim().to_ascii_lowercase())
        .filter(|r| !r.is_empty())
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = require_db(&state)?;
    let users = users::list(proxy.pool(), query.search.as_deref()).await?;
    Ok(ok(users))
}

async fn create_user(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let email = required(payload.email, "email")?;
    if !looks_like_email(&email) {
        return Err(AppError::validation("A valid email address is required"));
    }
    let password = payload.password.unwrap_or_default();
    let first_name = required(payload.first_name, "firstName")?;
    let last_name = required(payload.last_name, "lastName")?;
    let role = normalize_role(payload.role).unwrap_or_else(|| "user".to_string());

    let proxy = require_db(&state)?;
    let user = users::create(
        proxy.pool(),
        NewUser {
            email,
            password,
            first_name,
            last_name,
            role,
            organization: payload.organization,
        },
    )
    .await?;

    tracing::info!(admin_id = %admin.id, user_id = %user.id, "user created");
    Ok((StatusCode::CREATED, ok(user)))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id, "User not found")?;
    let payload = json_body(payload)?;
    if let Some(email) = payload.email.as_deref().filter(|e| !e.trim().is_empty()) {
        if !looks_like_email(email) {
            return Err(AppError::validation("A valid email address is required"));
        }
    }
    let demotes_self = payload
        .role
        .as_deref()
        .is_some_and(|role| !role.trim().eq_ignore_ascii_case("admin"));
    if id == admin.id && (payload.is_active == Some(false) || demotes_self) {
        return Err(AppError::validation(
            "You cannot deactivate or demote your own account",
        ));
    }

    let proxy = require_db(&state)?;
    let user = users::update(
        proxy.pool(),
        &id,
        UserUpdate {
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            role: normalize_role(payload.role),
            organization: payload.organization,
            is_active: payload.is_active,
        },
    )
    .await?;

    tracing::info!(admin_id = %admin.id, user_id = %user.id, "user updated");
    Ok(ok(user))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id, "User not found")?;
    if id == admin.id {
        return Err(AppError::validation("You cannot delete your own account"));
    }

    let proxy = require_db(&state)?;
    users::delete(proxy.pool(), &id).await?;
    tracing::info!(admin_id = %admin.id, user_id = %id, "user deleted");
    Ok(message("User deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_role() {
        assert_eq!(normalize_role(Some(" Admin ".into())), Some("admin".into()));
        assert_eq!(normalize_role(Some("".into())), None);
        assert_eq!(normalize_role(None), None);
    }
}
