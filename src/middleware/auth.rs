use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::{AuthError, SessionUser};
use crate::response::{json_error, AppError};
use crate::state::AppState;

async fn authenticate(state: &AppState, token: Option<String>) -> Result<SessionUser, AppError> {
    let Some(token) = token else {
        return Err(AppError::unauthorized("Not authenticated"));
    };

    let Some(proxy) = state.db_proxy() else {
        return Err(AppError::unavailable());
    };

    match crate::auth::lookup_session(proxy.pool(), &token).await {
        Ok(user) => Ok(user),
        Err(AuthError::Database(err)) => {
            tracing::warn!(error = %err, "session lookup failed");
            Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Session lookup failed",
            ))
        }
        Err(_) => Err(AppError::unauthorized("Session is invalid, please sign in again")),
    }
}

pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = crate::auth::extract_token(req.headers());
    match authenticate(&state, token).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = crate::auth::extract_token(req.headers());
    match authenticate(&state, token).await {
        Ok(user) if user.is_admin() => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(user) => {
            tracing::warn!(user_id = %user.id, "non-admin tried to reach admin route");
            AppError::forbidden("Admin permissions required").into_response()
        }
        Err(err) => err.into_response(),
    }
}
