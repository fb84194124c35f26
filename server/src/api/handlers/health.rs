//! Liveness of the gateway and reachability of the execution service.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::api::{ApiResponse, AppState};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub api_status: &'static str,
    pub janus_status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness of this service plus a probe of the execution service.
/// Always 200; the probe result is in the body.
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let janus = state.upstream.health().await;
    Json(HealthReport {
        api_status: "ok",
        janus_status: janus.as_str(),
    })
}

pub async fn status() -> ApiResponse<ServiceStatus> {
    ApiResponse::ok(
        "Service is running",
        ServiceStatus {
            status: "healthy",
            version: VERSION,
        },
    )
}
