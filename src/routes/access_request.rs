use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use super::{json_body, require_db, required};
use crate::db::operations::access_requests::{self, looks_like_email, NewAccessRequest};
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(submit))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessRequestPayload {
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    organization: Option<String>,
    message: Option<String>,
}

async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<AccessRequestPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let email = required(payload.email, "email")?;
    if !looks_like_email(&email) {
        return Err(AppError::validation("A valid email address is required"));
    }
    let first_name = required(payload.first_name, "firstName")?;
    let last_name = required(payload.last_name, "lastName")?;

    let proxy = require_db(&state)?;
    let request = access_requests::submit(
        proxy.pool(),
        NewAccessRequest {
            email,
            first_name,
            last_name,
            organization: payload.organization,
            message: payload.message,
        },
    )
    .await?;

    tracing::info!(request_id = %request.id, "access request submitted");
    Ok((StatusCode::CREATED, ok(request)))
}
