use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{non_blank, CrmError};

const PLACEHOLDER_LOGO: &str = "/placeholder-logo.svg";
const NOT_AVAILABLE: &str = "N/A";
const DEFAULT_EMPLOYEE_RANGE: &str = "1-10";

const COMPANY_COLUMNS: &str = r#"
    id::text AS id,
    name,
    logo_url,
    city,
    foundation_date,
    domain,
    employee_range,
    categories,
    industry,
    address,
    contact_email,
    revenue::float8 AS revenue,
    active,
    created_at,
    updated_at
"#;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    pub logo_url: Option<String>,
    pub city: Option<String>,
    pub foundation_date: Option<i32>,
    pub domain: Option<String>,
    pub employee_range: Option<String>,
    pub categories: Option<Vec<String>>,
    pub industry: Option<String>,
    pub address: Option<String>,
    pub contact_email: Option<String>,
    pub revenue: Option<f64>,
    pub active: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A company with display defaults filled in for the detail page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetail {
    pub id: String,
    pub name: String,
    pub logo_url: String,
    pub city: String,
    pub foundation_date: Option<i32>,
    pub domain: String,
    pub employee_range: String,
    pub categories: Vec<String>,
    pub industry: String,
    pub address: String,
    pub contact_email: String,
    pub revenue: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn or_default(value: Option<String>, default: &str) -> String {
    non_blank(value).unwrap_or_else(|| default.to_string())
}

impl From<Company> for CompanyDetail {
    fn from(company: Company) -> Self {
        Self {
            id: company.id,
            name: company.name,
            logo_url: or_default(company.logo_url, PLACEHOLDER_LOGO),
            city: or_default(company.city, NOT_AVAILABLE),
            foundation_date: company.foundation_date,
            domain: or_default(company.domain, NOT_AVAILABLE),
            employee_range: or_default(company.employee_range, DEFAULT_EMPLOYEE_RANGE),
            categories: company.categories.unwrap_or_default(),
            industry: or_default(company.industry, NOT_AVAILABLE),
            address: or_default(company.address, NOT_AVAILABLE),
            contact_email: or_default(company.contact_email, NOT_AVAILABLE),
            revenue: company.revenue.unwrap_or(0.0),
            active: company.active.unwrap_or(true),
            created_at: company.created_at,
            updated_at: company.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCompany {
    pub name: String,
    pub industry: Option<String>,
    pub address: Option<String>,
    pub contact_email: Option<String>,
    pub city: Option<String>,
    pub domain: Option<String>,
}

fn map_company(row: &PgRow) -> Result<Company, sqlx::Error> {
    Ok(Company {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        logo_url: row.try_get("logo_url")?,
        city: row.try_get("city")?,
        foundation_date: row.try_get("foundation_date")?,
        domain: row.try_get("domain")?,
        employee_range: row.try_get("employee_range")?,
        categories: row.try_get("categories")?,
        industry: row.try_get("industry")?,
        address: row.try_get("address")?,
        contact_email: row.try_get("contact_email")?,
        revenue: row.try_get("revenue")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn list(pool: &PgPool) -> Result<Vec<Company>, sqlx::Error> {
    let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies ORDER BY created_at DESC");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(map_company).collect()
}

pub async fn find(pool: &PgPool, id: &str) -> Result<Option<Company>, sqlx::Error> {
    let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id::text = $1");
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(map_company).transpose()
}

pub async fn exists(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM companies WHERE id::text = $1)"#)
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn create(pool: &PgPool, company: NewCompany) -> Result<Company, CrmError> {
    let name = company.name.trim();
    if name.is_empty() {
        return Err(CrmError::Validation("Company name is required".to_string()));
    }

    let sql = format!(
        "INSERT INTO companies (name, industry, address, contact_email, city, domain) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {COMPANY_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(name)
        .bind(non_blank(company.industry))
        .bind(non_blank(company.address))
        .bind(non_blank(company.contact_email))
        .bind(non_blank(company.city))
        .bind(non_blank(company.domain))
        .fetch_one(pool)
        .await?;

    Ok(map_company(&row)?)
}
