//! Admin database console: table listing, ad-hoc queries, export and import.

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::extract::multipart::MultipartRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::SessionUser;
use crate::db::operations::catalog;
use crate::response::{json_error, message, ok, AppError};
use crate::routes::{json_body, require_db};
use crate::sql::console::{self, DatabaseErrorInfo};
use crate::sql::export::{export_file_name, render_dump};
use crate::sql::{ImportError, ImportRunner};
use crate::state::AppState;

pub const MAX_IMPORT_BYTES: usize = 10 * 1024 * 1024;
const IMPORT_FIELD: &str = "sqlFile";
/// Room for multipart framing around a maximum-size file.
const IMPORT_BODY_SLACK: usize = 64 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tables", get(list_tables))
        .route("/tables/:name", delete(drop_table))
        .route("/query", post(run_query))
        .route("/export", get(export_database))
        .route("/import", post(import_database).layer(import_body_limit()))
}

fn import_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(MAX_IMPORT_BYTES + IMPORT_BODY_SLACK)
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportResponse {
    message: &'static str,
    statements_executed: usize,
}

#[derive(Serialize)]
struct ImportFailure {
    statement: usize,
    #[serde(flatten)]
    error: DatabaseErrorInfo,
}

async fn list_tables(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let proxy = require_db(&state)?;
    Ok(ok(catalog::list_tables(proxy.pool()).await?))
}

async fn drop_table(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("Table name is required"));
    }

    let proxy = require_db(&state)?;
    catalog::drop_table(proxy.pool(), &name).await?;
    tracing::info!(table = %name, admin_id = %admin.id, "table dropped");
    Ok(message(format!("Table \"{name}\" dropped successfully")))
}

async fn run_query(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let sql = payload.query.unwrap_or_default();
    if sql.trim().is_empty() {
        return Err(AppError::validation("Query is required"));
    }
    if console::is_forbidden(&sql) {
        tracing::warn!(admin_id = %admin.id, "blocked destructive console query");
        return Err(AppError::forbidden("This operation is not allowed"));
    }

    let proxy = require_db(&state)?;
    match console::run_query(proxy.pool(), &sql).await {
        Ok(outcome) => {
            tracing::info!(
                admin_id = %admin.id,
                command = %outcome.command,
                rows = outcome.row_count,
                "console query executed"
            );
            Ok(ok(outcome))
        }
        Err(err) => {
            let info = DatabaseErrorInfo::from_sqlx(&err);
            tracing::warn!(error = %err, "console query failed");
            Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "QUERY_FAILED",
                info.message.clone(),
            )
            .with_detail(info))
        }
    }
}

async fn export_database(State(state): State<AppState>) -> Result<Response, AppError> {
    let proxy = require_db(&state)?;
    let tables = catalog::dump_database(proxy.pool()).await?;
    if tables.is_empty() {
        return Err(AppError::not_found("No tables found in database"));
    }

    let created_at = Utc::now();
    let dump = render_dump(&tables, created_at);
    let disposition = format!("attachment; filename=\"{}\"", export_file_name(created_at));
    tracing::info!(tables = tables.len(), bytes = dump.len(), "database exported");

    Ok((
        [
            (header::CONTENT_TYPE, "application/sql".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        dump,
    )
        .into_response())
}

struct UploadedScript {
    file_name: String,
    contents: String,
}

async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadedScript, AppError> {
    let Ok(mut multipart) = multipart else {
        return Err(AppError::bad_request(
            "Invalid request format. Expected multipart/form-data",
        ));
    };

    let upload_error = |err: axum::extract::multipart::MultipartError| {
        tracing::warn!(error = %err, "failed to read import upload");
        AppError::bad_request("Could not read the uploaded file")
    };

    while let Some(mut field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(IMPORT_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.to_ascii_lowercase().ends_with(".sql") {
            return Err(AppError::validation("Only .sql files are accepted"));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(upload_error)? {
            if bytes.len() + chunk.len() > MAX_IMPORT_BYTES {
                return Err(AppError::validation("File size exceeds limit (10MB)"));
            }
            bytes.extend_from_slice(&chunk);
        }

        let contents = String::from_utf8(bytes)
            .map_err(|_| AppError::validation("SQL file must be UTF-8 encoded"))?;
        return Ok(UploadedScript {
            file_name,
            contents,
        });
    }

    Err(AppError::validation("SQL file is required"))
}

async fn import_database(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_upload(multipart).await?;
    let proxy = require_db(&state)?;

    tracing::info!(
        admin_id = %admin.id,
        file = %upload.file_name,
        bytes = upload.contents.len(),
        "sql import requested"
    );

    match ImportRunner::new(proxy.pool()).run(&upload.contents).await {
        Ok(summary) => Ok(ok(ImportResponse {
            message: "Database import completed successfully",
            statements_executed: summary.statements_executed,
        })),
        Err(err) => Err(import_error(err)),
    }
}

fn import_error(err: ImportError) -> AppError {
    let info = DatabaseErrorInfo::from_sqlx(err.database_error());
    match err.statement_index() {
        Some(index) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "IMPORT_FAILED",
            format!("Import failed at statement {index}; no changes were applied"),
        )
        .with_detail(ImportFailure {
            statement: index,
            error: info,
        }),
        None => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "IMPORT_FAILED",
            "Import failed; no changes were applied",
        )
        .with_detail(info),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    const BOUNDARY: &str = "crm-upload-boundary";

    async fn upload_size(
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<String, AppError> {
        let upload = read_upload(multipart).await?;
        Ok(format!("{}:{}", upload.file_name, upload.contents.len()))
    }

    fn upload_app() -> Router {
        Router::new().route("/", post(upload_size).layer(import_body_limit()))
    }

    fn multipart_request(field: &str, file_name: &str, contents: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/sql\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(request: Request<Body>) -> (StatusCode, String) {
        let response = upload_app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_upload_accepts_sql_file() {
        let (status, body) = send(multipart_request(
            IMPORT_FIELD,
            "backup.SQL",
            b"CREATE TABLE t (id int);",
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "backup.SQL:24");
    }

    #[tokio::test]
    async fn test_upload_requires_sql_file_field() {
        let (status, body) = send(multipart_request("file", "backup.sql", b"SELECT 1;")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("SQL file is required"));
    }

    #[tokio::test]
    async fn test_upload_rejects_other_extensions() {
        let (status, body) = send(multipart_request(IMPORT_FIELD, "backup.txt", b"SELECT 1;")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Only .sql files are accepted"));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_utf8() {
        let (status, body) = send(multipart_request(IMPORT_FIELD, "backup.sql", &[0xff, 0xfe, 0x00])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("UTF-8"));
    }

    #[tokio::test]
    async fn test_upload_size_limit_is_inclusive() {
        let exact = vec![b'a'; MAX_IMPORT_BYTES];
        let (status, body) = send(multipart_request(IMPORT_FIELD, "big.sql", &exact)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("big.sql:{MAX_IMPORT_BYTES}"));

        let over = vec![b'a'; MAX_IMPORT_BYTES + 1];
        let (status, body) = send(multipart_request(IMPORT_FIELD, "big.sql", &over)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("File size exceeds limit"));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_multipart_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"sqlFile":"SELECT 1;"}"#))
            .unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Expected multipart/form-data"));
    }

    #[test]
    fn test_import_error_names_failing_statement() {
        let err = ImportError::StatementFailed {
            index: 2,
            statement: "INSERT INTO missing VALUES (1);".into(),
            source: sqlx::Error::RowNotFound,
        };
        let app_err = import_error(err);
        assert_eq!(app_err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app_err.code(), "IMPORT_FAILED");
    }

    #[test]
    fn test_import_failure_detail_shape() {
        let detail = ImportFailure {
            statement: 3,
            error: DatabaseErrorInfo {
                message: "relation \"missing\" does not exist".into(),
                code: Some("42P01".into()),
                ..DatabaseErrorInfo::default()
            },
        };
        let json = serde_json::to_value(detail).unwrap();
        assert_eq!(json["statement"], 3);
        assert_eq!(json["code"], "42P01");
        assert_eq!(json["message"], "relation \"missing\" does not exist");
    }
}
