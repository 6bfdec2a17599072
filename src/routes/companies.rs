use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::{json_body, path_id, require_db, required};
use crate::db::operations::companies::{self, CompanyDetail, NewCompany};
use crate::db::operations::contacts;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_companies).post(create_company))
        .route("/:id", get(get_company))
        .route("/:id/contacts", get(company_contacts))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCompanyRequest {
    name: Option<String>,
    industry: Option<String>,
    address: Option<String>,
    #[serde(alias = "contact_email")]
    contact_email: Option<String>,
    city: Option<String>,
    domain: Option<String>,
}

async fn list_companies(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let proxy = require_db(&state)?;
    let companies = companies::list(proxy.pool()).await?;
    Ok(ok(companies))
}

async fn create_company(
    State(state): State<AppState>,
    payload: Result<Json<CreateCompanyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let name = required(payload.name, "name")?;

    let proxy = require_db(&state)?;
    let company = companies::create(
        proxy.pool(),
        NewCompany {
            name,
            industry: payload.industry,
            address: payload.address,
            contact_email: payload.contact_email,
            city: payload.city,
            domain: payload.domain,
        },
    )
    .await?;

    tracing::info!(company_id = %company.id, "company created");
    Ok((StatusCode::CREATED, ok(company)))
}

async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id, "Company not found")?;
    let proxy = require_db(&state)?;
    let Some(company) = companies::find(proxy.pool(), &id).await? else {
        return Err(AppError::not_found("Company not found"));
    };
    Ok(ok(CompanyDetail::from(company)))
}

async fn company_contacts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(&id, "Company not found")?;
    let proxy = require_db(&state)?;
    if !companies::exists(proxy.pool(), &id).await? {
        return Err(AppError::not_found("Company not found"));
    }
    let contacts = contacts::list_for_company(proxy.pool(), &id).await?;
    Ok(ok(contacts))
}
