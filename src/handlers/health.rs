use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
    /// Optional dependency not configured
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthDetails {
    pub database: ComponentHealth,
    pub checkout: ComponentHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub environment: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub details: HealthDetails,
}

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Call once at startup so uptime counts from boot, not from the first health check
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Process is up
pub async fn liveness() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "service": "dulce-bocatto",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Database reachable", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse),
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let db_result = crate::db::check_connection(&state.db).await;
    let latency = started.elapsed().as_millis() as u64;

    let database = match db_result {
        Ok(()) => ComponentHealth {
            status: ComponentStatus::Up,
            message: "Connection successful".to_string(),
            latency_ms: Some(latency),
        },
        Err(e) => ComponentHealth {
            status: ComponentStatus::Down,
            message: format!("Connection failed: {e}"),
            latency_ms: Some(latency),
        },
    };

    let checkout = if state.config.checkout_enabled() {
        ComponentHealth {
            status: ComponentStatus::Up,
            message: "Card checkout configured".to_string(),
            latency_ms: None,
        }
    } else {
        ComponentHealth {
            status: ComponentStatus::Disabled,
            message: "No card provider key; manual payments only".to_string(),
            latency_ms: None,
        }
    };

    let status = database.status;
    let code = if status == ComponentStatus::Up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: uptime_secs(),
        details: HealthDetails { database, checkout },
    };
    (code, Json(body))
}

#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "health",
    responses((status = 200, description = "Build and runtime information"))
)]
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "dulce-bocatto",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "uptime_secs": uptime_secs(),
        "checkout_enabled": state.config.checkout_enabled(),
    }))
}

/// Health checks served under the API prefix
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
}
