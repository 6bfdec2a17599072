use serde::Serialize;
use sqlx::{PgPool, Row};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: i64,
    pub active_users: i64,
    pub pending_requests: i64,
    pub db_size: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDashboardStats {
    pub companies: i64,
    pub contacts: i64,
    pub active_deals: i64,
    pub upcoming_meetings: i64,
}

pub fn format_db_size(bytes: i64) -> String {
    let mb = (bytes as f64 / (1024.0 * 1024.0)).round() as i64;
    format!("{mb} MB")
}

pub async fn admin_stats(pool: &PgPool) -> Result<AdminStats, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
          (SELECT COUNT(*) FROM users) AS total_users,
          (SELECT COUNT(*) FROM users WHERE is_active = true) AS active_users,
          (SELECT COUNT(*) FROM access_requests WHERE status = 'pending') AS pending_requests,
          pg_database_size(current_database()) AS db_size
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(AdminStats {
        total_users: row.try_get("total_users")?,
        active_users: row.try_get("active_users")?,
        pending_requests: row.try_get("pending_requests")?,
        db_size: format_db_size(row.try_get("db_size")?),
    })
}

pub async fn dashboard_stats(pool: &PgPool) -> Result<UserDashboardStats, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
          (SELECT COUNT(*) FROM companies) AS companies,
          (SELECT COUNT(*) FROM company_contacts) AS contacts,
          (SELECT COUNT(*) FROM deals WHERE status = 'active') AS active_deals,
          (SELECT COUNT(*) FROM meetings WHERE date > NOW()) AS upcoming_meetings
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(UserDashboardStats {
        companies: row.try_get("companies")?,
        contacts: row.try_get("contacts")?,
        active_deals: row.try_get("active_deals")?,
        upcoming_meetings: row.try_get("upcoming_meetings")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_db_size_rounds_to_whole_megabytes() {
        assert_eq!(format_db_size(0), "0 MB");
        assert_eq!(format_db_size(8 * 1024 * 1024), "8 MB");
        assert_eq!(format_db_size(8 * 1024 * 1024 + 600 * 1024), "9 MB");
        assert_eq!(format_db_size(700 * 1024), "1 MB");
    }
}
