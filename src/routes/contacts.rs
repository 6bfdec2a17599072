use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::{json_body, path_id, require_db, required};
use crate::db::operations::contacts::{self, ContactDetail, NewContact};
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contacts).post(create_contact))
        .route("/:id", get(get_contact))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateContactRequest {
    company_id: Option<String>,
    name: Option<String>,
    position: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    status: Option<String>,
}

async fn list_contacts(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let proxy = require_db(&state)?;
    Ok(ok(contacts::list(proxy.pool()).await?))
}

async fn create_contact(
    State(state): State<AppState>,
    payload: Result<Json<CreateContactRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let name = required(payload.name, "name")?;
    contacts::normalize_status(payload.status.as_deref())?;

    let proxy = require_db(&state)?;
    let contact = contacts::create(
        proxy.pool(),
        NewContact {
            company_id: payload.company_id,
            name,
            position: payload.position,
            email: payload.email,
            phone: payload.phone,
            status: payload.status,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, ok(ContactDetail::from(contact))))
}

async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id, "Contact not found")?;
    let proxy = require_db(&state)?;
    match contacts::find(proxy.pool(), &id).await? {
        Some(contact) => Ok(ok(ContactDetail::from(contact))),
        None => Err(AppError::not_found("Contact not found")),
    }
}
