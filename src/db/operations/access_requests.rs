use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::users::{self, UserRecord};
use super::{is_unique_violation, non_blank, CrmError};

const TEMPORARY_PASSWORD_LEN: usize = 12;

const REQUEST_COLUMNS: &str = r#"
    id::text AS id,
    email,
    first_name,
    last_name,
    organization,
    message,
    status,
    reviewed_by::text AS reviewed_by,
    reviewed_at,
    created_at
"#;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub organization: Option<String>,
    pub message: Option<String>,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAccessRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub organization: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedRequest {
    pub request: AccessRequest,
    pub user: UserRecord,
    pub temporary_password: String,
}

/// Loose shape check: one `@`, something before it, a dot in the domain.
pub fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

pub fn temporary_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TEMPORARY_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

fn map_request(row: &PgRow) -> Result<AccessRequest, sqlx::Error> {
    Ok(AccessRequest {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        organization: row.try_get("organization")?,
        message: row.try_get("message")?,
        status: row.try_get("status")?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn submit(pool: &PgPool, request: NewAccessRequest) -> Result<AccessRequest, CrmError> {
    let email = request.email.trim().to_string();
    if !looks_like_email(&email) {
        return Err(CrmError::Validation("A valid email address is required".to_string()));
    }
    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(CrmError::Validation(
            "First name and last name are required".to_string(),
        ));
    }

    let pending: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
          SELECT 1 FROM access_requests
          WHERE lower(email) = lower($1) AND status = 'pending'
        )
        "#,
    )
    .bind(&email)
    .fetch_one(pool)
    .await?;

    if pending {
        return Err(CrmError::Validation(
            "A request for this email is already pending".to_string(),
        ));
    }

    let sql = format!(
        "INSERT INTO access_requests (email, first_name, last_name, organization, message) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {REQUEST_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(&email)
        .bind(first_name)
        .bind(last_name)
        .bind(non_blank(request.organization))
        .bind(non_blank(request.message))
        .fetch_one(pool)
        .await?;

    Ok(map_request(&row)?)
}

pub async fn list(pool: &PgPool) -> Result<Vec<AccessRequest>, sqlx::Error> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM access_requests \
         ORDER BY (status = 'pending') DESC, created_at DESC"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(map_request).collect()
}

pub async fn approve(
    pool: &PgPool,
    id: &str,
    reviewer_id: &str,
) -> Result<ApprovedRequest, CrmError> {
    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {REQUEST_COLUMNS} FROM access_requests WHERE id::text = $1 FOR UPDATE");
    let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *tx).await?;
    let Some(row) = row else {
        return Err(CrmError::NotFound("Access request not found".to_string()));
    };
    let request = map_request(&row)?;
    if request.status != "pending" {
        return Err(CrmError::Conflict(format!(
            "Access request is already {}",
            request.status
        )));
    }

    let temporary_password = temporary_password();
    let password_hash = users::hash_password(&temporary_password)?;

    let user_row = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name, role, organization)
        VALUES ($1, $2, $3, $4, 'user', $5)
        RETURNING id::text AS id
        "#,
    )
    .bind(&request.email)
    .bind(&password_hash)
    .bind(&request.first_name)
    .bind(&request.last_name)
    .bind(&request.organization)
    .fetch_one(&mut *tx)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            CrmError::Conflict("A user with this email already exists".to_string())
        } else {
            CrmError::Sql(err)
        }
    })?;
    let user_id: String = user_row.try_get("id")?;

    let sql = format!(
        "UPDATE access_requests \
         SET status = 'approved', reviewed_by = $2::uuid, reviewed_at = NOW() \
         WHERE id::text = $1 \
         RETURNING {REQUEST_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(reviewer_id)
        .fetch_one(&mut *tx)
        .await?;
    let request = map_request(&row)?;

    tx.commit().await?;

    let user = users::find_active_by_id(pool, &user_id)
        .await?
        .ok_or_else(|| CrmError::NotFound("User not found".to_string()))?;

    tracing::info!(request_id = %request.id, user_id = %user.id, "access request approved");

    Ok(ApprovedRequest {
        request,
        user,
        temporary_password,
    })
}

pub async fn reject(pool: &PgPool, id: &str, reviewer_id: &str) -> Result<AccessRequest, CrmError> {
    let sql = format!(
        "UPDATE access_requests \
         SET status = 'rejected', reviewed_by = $2::uuid, reviewed_at = NOW() \
         WHERE id::text = $1 AND status = 'pending' \
         RETURNING {REQUEST_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(reviewer_id)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = row {
        return Ok(map_request(&row)?);
    }

    let exists: bool =
        sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM access_requests WHERE id::text = $1)"#)
            .bind(id)
            .fetch_one(pool)
            .await?;

    if exists {
        Err(CrmError::Conflict("Access request is not pending".to_string()))
    } else {
        Err(CrmError::NotFound("Access request not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("jane@example.com"));
        assert!(looks_like_email("  jane.doe+crm@sub.example.de "));
        assert!(!looks_like_email("jane@example"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("jane@@example.com"));
        assert!(!looks_like_email("jane doe@example.com"));
        assert!(!looks_like_email("jane@.com"));
        assert!(!looks_like_email(""));
    }

    #[test]
    fn test_temporary_password_shape() {
        let first = temporary_password();
        let second = temporary_password();
        assert_eq!(first.len(), TEMPORARY_PASSWORD_LEN);
        assert!(first.chars().all(|ch| ch.is_ascii_alphanumeric()));
        assert_ne!(first, second);
        assert!(users::validate_password(&first).is_ok());
    }
}
