use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

/// Health report served on `GET /status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: u64,
    pub uptime_formatted: String,
    pub server: ServerInfo,
    pub clients: ClientInfo,
    pub database: DatabaseInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub port: u16,
    pub ping_interval: u64,
    pub pong_timeout: u64,
}

#[derive(Debug, Serialize)]
pub struct ClientInfo {
    pub total: usize,
    pub alive: usize,
    pub inactive: usize,
}

#[derive(Debug, Serialize)]
pub struct DatabaseInfo {
    pub status: &'static str,
}

/// `1d 2h 3m 4s`, dropping leading zero units.
pub fn format_uptime(uptime: Duration) -> String {
    let seconds = uptime.as_secs();
    let (days, hours, minutes, secs) = (
        seconds / 86_400,
        seconds / 3_600 % 24,
        seconds / 60 % 60,
        seconds % 60,
    );
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {secs}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let uptime = state.started_at.elapsed();
    let total = state.registry.len();
    let alive = state.registry.alive_count().min(total);

    let database = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            "disconnected"
        },
    };

    let report = StatusResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime: uptime.as_millis() as u64,
        uptime_formatted: format_uptime(uptime),
        server: ServerInfo {
            port: state.config.port(),
            ping_interval: state.config.heartbeat.ping_interval_ms,
            pong_timeout: state.config.heartbeat.pong_timeout_ms,
        },
        clients: ClientInfo {
            total,
            alive,
            inactive: total - alive,
        },
        database: DatabaseInfo { status: database },
    };
    serde_json::to_value(&report)
        .map(Json)
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// `OPTIONS` on a known route that is not a CORS preflight.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Unmatched routes: bare `OPTIONS` requests succeed, anything else is a
/// JSON 404.
pub async fn fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        return preflight().await.into_response();
    }
    AppError::NotFound("Available endpoints: GET /status".to_string()).into_response()
}
