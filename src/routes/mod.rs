mod access_request;
mod admin;
mod assistant;
mod companies;
mod contacts;
mod health;
mod session;
mod user;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};

use crate::db::DatabaseProxy;
use crate::middleware::auth::{require_admin, require_user};
use crate::response::{json_error, AppError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let require_user = middleware::from_fn_with_state(state.clone(), require_user);

    let user_routes = Router::new()
        .nest("/api/user", user::router())
        .nest("/api/unternehmen", companies::router())
        .nest("/api/kontakte", contacts::router())
        .nest("/api/ai-assistant", assistant::router())
        .layer(require_user);

    Router::new()
        .nest("/api/auth", session::router())
        .nest("/api/access-request", access_request::router())
        .nest(
            "/api/admin",
            admin::router().layer(middleware::from_fn_with_state(
                state.clone(),
                require_admin,
            )),
        )
        .merge(user_routes)
        .nest("/health", health::router())
        .fallback(fallback_handler)
        .with_state(state)
}

/// Every data route needs the pool; without one the service is degraded.
pub(crate) fn require_db(state: &AppState) -> Result<Arc<DatabaseProxy>, AppError> {
    state.db_proxy().ok_or_else(AppError::unavailable)
}

pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(AppError::bad_request(rejection.body_text())),
    }
}

/// Canonical form of a UUID path segment; anything else cannot match a row.
pub(crate) fn path_id(raw: &str, not_found: &str) -> Result<String, AppError> {
    uuid::Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| AppError::not_found(not_found))
}

/// Trimmed value of a required text field, or a validation error naming it.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("{field} is required")))
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Route not found").into_response()
}
