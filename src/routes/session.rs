use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{json_body, require_db};
use crate::auth::{clear_session_cookie, session_cookie};
use crate::db::operations::users::{self, UserRecord};
use crate::response::{ok, AppError};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(login).delete(logout))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct LoginResponse {
    user: UserRecord,
    message: &'static str,
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let payload = json_body(payload)?;
    let email = payload.email.as_deref().map(str::trim).unwrap_or_default();
    let password = payload.password.as_deref().unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let proxy = require_db(&state)?;
    let Some(credentials) = users::find_active_by_email(proxy.pool(), email).await? else {
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    if !users::verify_password(password, &credentials.password_hash) {
        tracing::info!(user_id = %credentials.user.id, "login rejected: wrong password");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    if let Err(err) = users::touch_last_login(proxy.pool(), &credentials.user.id).await {
        tracing::warn!(error = %err, "failed to update last login");
    }

    let cookie = session_cookie(&credentials.user.id, state.config().is_production());
    tracing::info!(user_id = %credentials.user.id, "user signed in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        ok(LoginResponse {
            user: credentials.user,
            message: "Login successful",
        }),
    )
        .into_response())
}

async fn logout(State(state): State<AppState>) -> Response {
    let cookie = clear_session_cookie(state.config().is_production());
    (
        [(header::SET_COOKIE, cookie)],
        crate::response::message("Logged out successfully"),
    )
        .into_response()
}
