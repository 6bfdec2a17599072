use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{is_unique_violation, non_blank, CrmError};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const ROLES: &[&str] = &["user", "admin"];
const BCRYPT_COST: u32 = 10;

const USER_COLUMNS: &str = r#"
    id::text AS id,
    email,
    first_name,
    last_name,
    role,
    organization,
    is_active,
    last_login,
    created_at
"#;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub organization: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: UserRecord,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub organization: Option<String>,
    pub is_active: Option<bool>,
}

fn map_user(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        role: row.try_get("role")?,
        organization: row.try_get("organization")?,
        is_active: row.try_get("is_active")?,
        last_login: row.try_get("last_login")?,
        created_at: row.try_get("created_at")?,
    })
}

pub fn validate_role(role: &str) -> Result<(), CrmError> {
    if ROLES.contains(&role) {
        Ok(())
    } else {
        Err(CrmError::Validation(format!(
            "Role must be one of: {}",
            ROLES.join(", ")
        )))
    }
}

pub fn validate_password(password: &str) -> Result<(), CrmError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CrmError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, CrmError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub async fn find_active_by_id(pool: &PgPool, id: &str) -> Result<Option<UserRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id::text = $1 AND is_active = true"
    );
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(map_user).transpose()
}

pub async fn find_active_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserCredentials>, sqlx::Error> {
    let sql = format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users \
         WHERE lower(email) = lower($1) AND is_active = true"
    );
    let row = sqlx::query(&sql).bind(email).fetch_optional(pool).await?;
    let Some(row) = row else {
        return Ok(None);
    };
    Ok(Some(UserCredentials {
        user: map_user(&row)?,
        password_hash: row.try_get("password_hash")?,
    }))
}

pub async fn password_hash(pool: &PgPool, id: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT password_hash FROM users WHERE id::text = $1"#)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn set_password_hash(pool: &PgPool, id: &str, hash: &str) -> Result<(), CrmError> {
    let result = sqlx::query(
        r#"UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id::text = $1"#,
    )
    .bind(id)
    .bind(hash)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CrmError::NotFound("User not found".to_string()));
    }
    Ok(())
}

pub async fn touch_last_login(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE users SET last_login = NOW() WHERE id::text = $1"#)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list(pool: &PgPool, search: Option<&str>) -> Result<Vec<UserRecord>, sqlx::Error> {
    let rows = match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users \
                 WHERE email ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1 \
                    OR organization ILIKE $1 \
                 ORDER BY created_at DESC"
            );
            sqlx::query(&sql)
                .bind(format!("%{term}%"))
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
            sqlx::query(&sql).fetch_all(pool).await?
        }
    };
    rows.iter().map(map_user).collect()
}

pub async fn create(pool: &PgPool, new_user: NewUser) -> Result<UserRecord, CrmError> {
    validate_password(&new_user.password)?;
    validate_role(&new_user.role)?;
    let password_hash = hash_password(&new_user.password)?;

    let sql = format!(
        "INSERT INTO users (email, password_hash, first_name, last_name, role, organization) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(new_user.email.trim())
        .bind(&password_hash)
        .bind(new_user.first_name.trim())
        .bind(new_user.last_name.trim())
        .bind(&new_user.role)
        .bind(non_blank(new_user.organization))
        .fetch_one(pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                CrmError::Conflict("A user with this email already exists".to_string())
            } else {
                CrmError::Sql(err)
            }
        })?;

    Ok(map_user(&row)?)
}

pub async fn update(pool: &PgPool, id: &str, changes: UserUpdate) -> Result<UserRecord, CrmError> {
    if let Some(role) = changes.role.as_deref() {
        validate_role(role)?;
    }

    let sql = format!(
        "UPDATE users SET \
            email = COALESCE($2, email), \
            first_name = COALESCE($3, first_name), \
            last_name = COALESCE($4, last_name), \
            role = COALESCE($5, role), \
            organization = COALESCE($6, organization), \
            is_active = COALESCE($7, is_active), \
            updated_at = NOW() \
         WHERE id::text = $1 \
         RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(non_blank(changes.email))
        .bind(non_blank(changes.first_name))
        .bind(non_blank(changes.last_name))
        .bind(changes.role)
        .bind(changes.organization.map(|o| o.trim().to_string()))
        .bind(changes.is_active)
        .fetch_optional(pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                CrmError::Conflict("A user with this email already exists".to_string())
            } else {
                CrmError::Sql(err)
            }
        })?;

    match row {
        Some(row) => Ok(map_user(&row)?),
        None => Err(CrmError::NotFound("User not found".to_string())),
    }
}

pub async fn delete(pool: &PgPool, id: &str) -> Result<(), CrmError> {
    let result = sqlx::query(r#"DELETE FROM users WHERE id::text = $1"#)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CrmError::NotFound("User not found".to_string()));
    }
    Ok(())
}
