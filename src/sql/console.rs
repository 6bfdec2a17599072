//! Ad-hoc SQL console for administrators.
//!
//! Statements are sent as plain query text (no bind parameters), so
//! Postgres answers over the simple query protocol and every value arrives
//! in text form. Values are converted to JSON from that text using the
//! column type name.

use futures_util::TryStreamExt;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::PgDatabaseError;
use sqlx::{Column, ColumnIndex, Decode, Either, Executor, PgPool, Row, TypeInfo};

const READ_ONLY_PREFIXES: &[&str] = &["select", "explain", "show"];
const FORBIDDEN_FRAGMENTS: &[&str] = &["drop database", "truncate schema", "drop schema public"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    pub rows: Vec<Map<String, Value>>,
    pub row_count: u64,
    pub command: String,
}

/// Postgres error fields surfaced back to the console user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseErrorInfo {
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub code: Option<String>,
}

impl DatabaseErrorInfo {
    pub fn from_sqlx(err: &sqlx::Error) -> Self {
        let sqlx::Error::Database(db_err) = err else {
            return Self {
                message: err.to_string(),
                ..Self::default()
            };
        };

        let pg = db_err.try_downcast_ref::<PgDatabaseError>();
        Self {
            message: db_err.message().to_string(),
            detail: pg.and_then(|e| e.detail()).map(str::to_string),
            hint: pg.and_then(|e| e.hint()).map(str::to_string),
            code: db_err.code().map(|code| code.into_owned()),
        }
    }
}

pub fn is_read_only(sql: &str) -> bool {
    let lowered = sql.trim().to_lowercase();
    READ_ONLY_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

/// Destructive schema-wide operations are refused unless the text reads as
/// a read-only query.
pub fn is_forbidden(sql: &str) -> bool {
    if is_read_only(sql) {
        return false;
    }
    let lowered = sql.to_lowercase();
    FORBIDDEN_FRAGMENTS
        .iter()
        .any(|fragment| lowered.contains(fragment))
}

/// First keyword of the statement, upper-cased (`SELECT`, `UPDATE`, ...).
pub fn command_tag(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .map(|word| {
            word.trim_end_matches(';')
                .chars()
                .take_while(|ch| ch.is_ascii_alphabetic())
                .collect::<String>()
                .to_ascii_uppercase()
        })
        .unwrap_or_default()
}

pub fn text_to_json(type_name: &str, raw: String) -> Value {
    match type_name.to_ascii_uppercase().as_str() {
        "BOOL" => match raw.as_str() {
            "t" | "true" => Value::Bool(true),
            "f" | "false" => Value::Bool(false),
            _ => Value::String(raw),
        },
        "INT2" | "INT4" | "INT8" | "OID" => match raw.parse::<i64>() {
            Ok(value) => Value::from(value),
            Err(_) => Value::String(raw),
        },
        // NUMERIC stays text: arbitrary precision does not survive f64.
        "FLOAT4" | "FLOAT8" => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(raw)),
        "JSON" | "JSONB" => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        _ => Value::String(raw),
    }
}

/// Converts a row fetched with plain query text into a JSON object.
///
/// A value that cannot be read as text is an error, never a JSON null.
pub fn row_to_json<R>(row: &R) -> Result<Map<String, Value>, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> Option<String>: Decode<'r, R::Database>,
{
    let mut object = Map::with_capacity(row.columns().len());
    for column in row.columns() {
        let raw: Option<String> = row.try_get_unchecked(column.ordinal()).map_err(|err| {
            tracing::warn!(column = %column.name(), error = %err, "failed to decode column as text");
            err
        })?;
        let value = match raw {
            Some(raw) => text_to_json(column.type_info().name(), raw),
            None => Value::Null,
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}

/// Fetches every row of `sql` in text form.
pub async fn fetch_rows(pool: &PgPool, sql: &str) -> Result<Vec<Map<String, Value>>, sqlx::Error> {
    let rows = Executor::fetch_all(pool, sql).await?;
    rows.iter().map(row_to_json).collect()
}

/// Runs the console text, which may hold several statements.
///
/// `row_count` sums what the server reports per statement: rows returned
/// for queries, rows affected for data changes.
pub async fn run_query(pool: &PgPool, sql: &str) -> Result<QueryOutcome, sqlx::Error> {
    let mut rows = Vec::new();
    let mut row_count = 0u64;

    let mut stream = Executor::fetch_many(pool, sql);
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(done) => row_count += done.rows_affected(),
            Either::Right(row) => rows.push(row_to_json(&row)?),
        }
    }

    Ok(QueryOutcome {
        rows,
        row_count,
        command: command_tag(sql),
    })
}
