use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::db::HealthCheckSnapshot;
use crate::state::AppState;

const SERVICE_NAME: &str = "crm-backend";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/info", get(info))
        .route("/live", get(live))
        .route("/database", get(database))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthInfoResponse {
    service: &'static str,
    version: &'static str,
    environment: String,
    start_time: String,
    uptime: u64,
}

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseStatusResponse {
    r#type: &'static str,
    configured: bool,
    #[serde(flatten)]
    monitor: Option<HealthCheckSnapshot>,
}

async fn root(State(state): State<AppState>) -> Response {
    let check = match state.db_proxy() {
        Some(proxy) => Some(proxy.ping().await),
        None => None,
    };
    let healthy = check.as_ref().is_some_and(|c| c.healthy);

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        database: if healthy { "connected" } else { "disconnected" },
        latency_ms: check.and_then(|c| c.latency_ms),
        timestamp: now_iso(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}

async fn info(State(state): State<AppState>) -> Response {
    let response = HealthInfoResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config().environment.clone(),
        start_time: system_time_iso(state.started_at_system()),
        uptime: state.uptime_seconds(),
    };

    Json(response).into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    Json(LivenessResponse {
        status: "healthy",
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
    })
    .into_response()
}

async fn database(State(state): State<AppState>) -> Response {
    let monitor = match state.db_proxy() {
        Some(proxy) => Some(proxy.health_status().await),
        None => None,
    };

    Json(DatabaseStatusResponse {
        r#type: "postgresql",
        configured: monitor.is_some(),
        monitor,
    })
    .into_response()
}

fn system_time_iso(time: std::time::SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Utc> = time.into();
    datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_iso_uses_millis_and_z() {
        let time = std::time::UNIX_EPOCH + std::time::Duration::from_millis(1_500);
        assert_eq!(system_time_iso(time), "1970-01-01T00:00:01.500Z");
    }

    #[test]
    fn test_unconfigured_database_status_shape() {
        let json = serde_json::to_value(DatabaseStatusResponse {
            r#type: "postgresql",
            configured: false,
            monitor: None,
        })
        .unwrap();
        assert_eq!(json["type"], "postgresql");
        assert_eq!(json["configured"], false);
        assert!(json.get("healthy").is_none());
    }
}
