//! Endpoint handlers, one module per resource.

pub mod auth;
pub mod batches;
pub mod configs;
pub mod health;
pub mod jobs;
pub mod submit;

use axum::Json;
use axum::extract::rejection::JsonRejection;

use super::ApiError;

/// Unwrap a JSON body, turning any rejection into a 400 envelope.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(ApiError::from)
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found")
}
