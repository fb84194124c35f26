//! Submission proxy to the execution service.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use crate::api::{ApiError, AppState};
use crate::auth::Principal;

pub const JOB_PATH: &str = "/dashboard/jobs";
pub const BATCH_PATH: &str = "/dashboard/jobs/batch";
pub const BATCH_ATOMIC_PATH: &str = "/dashboard/jobs/batch/atomic";

async fn relay(
    state: &AppState,
    principal: &Principal,
    path: &str,
    body: Bytes,
) -> Result<Response, ApiError> {
    let relayed = state
        .upstream
        .forward(path, &principal.subject_id.to_string(), body)
        .await?;

    let content_type = relayed
        .content_type
        .unwrap_or_else(|| "application/json".to_string());
    Ok((
        relayed.status,
        [(CONTENT_TYPE, content_type)],
        Body::from(relayed.body),
    )
        .into_response())
}

pub async fn job(
    State(state): State<AppState>,
    principal: Principal,
    body: Bytes,
) -> Result<Response, ApiError> {
    relay(&state, &principal, JOB_PATH, body).await
}

pub async fn batch(
    State(state): State<AppState>,
    principal: Principal,
    body: Bytes,
) -> Result<Response, ApiError> {
    relay(&state, &principal, BATCH_PATH, body).await
}

pub async fn batch_atomic(
    State(state): State<AppState>,
    principal: Principal,
    body: Bytes,
) -> Result<Response, ApiError> {
    relay(&state, &principal, BATCH_ATOMIC_PATH, body).await
}
