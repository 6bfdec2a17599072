//! Schema introspection for the admin database console.

use serde::Serialize;
use sqlx::{PgPool, Row};

use super::CrmError;
use crate::sql::console;
use crate::sql::export::{quote_ident, ColumnDef, TableDump, EXPORT_ROW_LIMIT};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub name: String,
    pub row_count: i64,
    pub size_in_mb: f64,
}

/// Column type as it should appear in a `CREATE TABLE`.
pub fn render_column_type(data_type: &str, udt_name: &str, max_length: Option<i32>) -> String {
    match data_type {
        "ARRAY" => format!("{}[]", udt_name.trim_start_matches('_')),
        "USER-DEFINED" => udt_name.to_string(),
        "character varying" | "character" => match max_length {
            Some(len) => format!("{data_type}({len})"),
            None => data_type.to_string(),
        },
        _ => data_type.to_string(),
    }
}

pub async fn table_names(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
        ORDER BY table_name
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn list_tables(pool: &PgPool) -> Result<Vec<TableInfo>, sqlx::Error> {
    let names = table_names(pool).await?;
    let mut tables = Vec::with_capacity(names.len());

    for name in names {
        let count_sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&name));
        let row_count: i64 = sqlx::query_scalar(&count_sql).fetch_one(pool).await?;

        let size_bytes: i64 =
            sqlx::query_scalar(r#"SELECT pg_total_relation_size(quote_ident($1)::regclass)"#)
                .bind(&name)
                .fetch_one(pool)
                .await?;

        tables.push(TableInfo {
            name,
            row_count,
            size_in_mb: size_bytes as f64 / BYTES_PER_MB,
        });
    }

    Ok(tables)
}

/// Views are listed in `information_schema.tables` too; only base tables
/// can be dropped with `DROP TABLE`.
const TABLE_EXISTS_SQL: &str = r#"
    SELECT EXISTS (
      SELECT 1 FROM information_schema.tables
      WHERE table_schema = 'public'
        AND table_type = 'BASE TABLE'
        AND table_name = $1
    )
"#;

pub async fn table_exists(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(TABLE_EXISTS_SQL)
        .bind(name)
        .fetch_one(pool)
        .await
}

pub async fn drop_table(pool: &PgPool, name: &str) -> Result<(), CrmError> {
    if !table_exists(pool, name).await? {
        return Err(CrmError::NotFound(format!("Table \"{name}\" does not exist")));
    }

    let sql = format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(name));
    sqlx::query(&sql).execute(pool).await?;
    tracing::warn!(table = %name, "table dropped from admin console");
    Ok(())
}

pub async fn column_defs(pool: &PgPool, table: &str) -> Result<Vec<ColumnDef>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT
          column_name::text AS column_name,
          data_type::text AS data_type,
          udt_name::text AS udt_name,
          character_maximum_length::int4 AS max_length,
          column_default::text AS column_default,
          is_nullable::text AS is_nullable
        FROM information_schema.columns
        WHERE table_schema = 'public' AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let data_type: String = row.try_get("data_type")?;
            let udt_name: String = row.try_get("udt_name")?;
            let max_length: Option<i32> = row.try_get("max_length")?;
            let is_nullable: String = row.try_get("is_nullable")?;
            Ok(ColumnDef {
                name: row.try_get("column_name")?,
                data_type: render_column_type(&data_type, &udt_name, max_length),
                default: row.try_get("column_default")?,
                nullable: is_nullable == "YES",
            })
        })
        .collect()
}

pub async fn primary_key(pool: &PgPool, table: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT kcu.column_name::text
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
          ON tc.constraint_name = kcu.constraint_name
         AND tc.table_schema = kcu.table_schema
        WHERE tc.constraint_type = 'PRIMARY KEY'
          AND tc.table_schema = 'public'
          AND tc.table_name = $1
        ORDER BY kcu.ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
}

pub async fn dump_table(pool: &PgPool, name: &str) -> Result<TableDump, sqlx::Error> {
    let columns = column_defs(pool, name).await?;
    let primary_key = primary_key(pool, name).await?;
    let select = format!(
        "SELECT * FROM {} LIMIT {EXPORT_ROW_LIMIT}",
        quote_ident(name)
    );
    let rows = console::fetch_rows(pool, &select).await?;

    Ok(TableDump {
        name: name.to_string(),
        columns,
        primary_key,
        rows,
    })
}

pub async fn dump_database(pool: &PgPool) -> Result<Vec<TableDump>, sqlx::Error> {
    let mut tables = Vec::new();
    for name in table_names(pool).await? {
        tables.push(dump_table(pool, &name).await?);
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_exists_ignores_views() {
        assert!(TABLE_EXISTS_SQL.contains("table_type = 'BASE TABLE'"));
        assert!(TABLE_EXISTS_SQL.contains("table_schema = 'public'"));
    }

    #[test]
    fn test_render_column_type() {
        assert_eq!(render_column_type("integer", "int4", None), "integer");
        assert_eq!(render_column_type("ARRAY", "_text", None), "text[]");
        assert_eq!(render_column_type("USER-DEFINED", "mood", None), "mood");
        assert_eq!(
            render_column_type("character varying", "varchar", Some(255)),
            "character varying(255)"
        );
        assert_eq!(
            render_column_type("character varying", "varchar", None),
            "character varying"
        );
        assert_eq!(
            render_column_type("timestamp with time zone", "timestamptz", None),
            "timestamp with time zone"
        );
    }
}
