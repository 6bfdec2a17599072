use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::db::operations::stats;
use crate::response::{ok, AppError};
use crate::routes::require_db;
use crate::state::AppState;

mod access_requests;
mod database;
mod users;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminCheck {
    is_admin: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth", get(check_admin))
        .route("/stats", get(get_stats))
        .nest("/users", users::router())
        .nest("/access-requests", access_requests::router())
        .nest("/database", database::router())
}

/// Reaching this handler means the admin middleware already accepted the caller.
async fn check_admin() -> impl IntoResponse {
    ok(AdminCheck { is_admin: true })
}

async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let proxy = require_db(&state)?;
    Ok(ok(stats::admin_stats(proxy.pool()).await?))
}
