use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use super::{json_body, require_db, required};
use crate::auth::SessionUser;
use crate::db::operations::stats::{self, UserDashboardStats};
use crate::db::operations::users;
use crate::response::{message, ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(profile))
        .route("/change-password", post(change_password))
}

#[derive(Serialize)]
struct ProfileResponse {
    #[serde(flatten)]
    user: SessionUser,
    stats: UserDashboardStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: Option<String>,
    new_password: Option<String>,
}

async fn profile(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = require_db(&state)?;
    let stats = stats::dashboard_stats(proxy.pool()).await?;
    Ok(ok(ProfileResponse { user, stats }))
}

async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let current = required(payload.current_password, "currentPassword")?;
    let new_password = required(payload.new_password, "newPassword")?;
    users::validate_password(&new_password)?;

    let proxy = require_db(&state)?;
    let Some(hash) = users::password_hash(proxy.pool(), &user.id).await? else {
        return Err(AppError::not_found("User not found"));
    };
    if !users::verify_password(&current, &hash) {
        return Err(AppError::validation("Current password is incorrect"));
    }

    let new_hash = users::hash_password(&new_password)?;
    users::set_password_hash(proxy.pool(), &user.id, &new_hash).await?;
    tracing::info!(user_id = %user.id, "password changed");

    Ok(message("Password updated successfully"))
}
