use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Router};

use crate::auth::SessionUser;
use crate::db::operations::access_requests;
use crate::response::{ok, AppError};
use crate::routes::{path_id, require_db};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests))
        .route("/:id/approve", post(approve_request))
        .route("/:id/reject", post(reject_request))
}

async fn list_requests(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let proxy = require_db(&state)?;
    Ok(ok(access_requests::list(proxy.pool()).await?))
}

/// The temporary password is only ever returned in this response.
async fn approve_request(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id, "Access request not found")?;
    let proxy = require_db(&state)?;
    let approved = access_requests::approve(proxy.pool(), &id, &admin.id).await?;
    Ok(ok(approved))
}

async fn reject_request(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id, "Access request not found")?;
    let proxy = require_db(&state)?;
    let request = access_requests::reject(proxy.pool(), &id, &admin.id).await?;
    tracing::info!(admin_id = %admin.id, request_id = %request.id, "access request rejected");
    Ok(ok(request))
}
