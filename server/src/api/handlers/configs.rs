//! Job configuration endpoints. All of them act on the caller's own records.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use super::json_body;
use crate::api::{ApiError, ApiResponse, AppState};
use crate::auth::Principal;
use crate::store::{ConfigId, ConfigPatch, ConfigRecord, ConfigStatus, Document};

const NOT_FOUND: &str = "Config not found";

#[derive(Debug, Deserialize)]
pub struct CreateConfigRequest {
    #[serde(default)]
    pub config_name: String,
    #[serde(default)]
    pub config: Option<Document>,
}

/// Absent fields, and an empty `config_name`, are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateConfigRequest {
    #[serde(default)]
    pub config_name: Option<String>,
    #[serde(default)]
    pub config: Option<Document>,
}

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub config_id: ConfigId,
    pub config_name: String,
    pub config: Document,
    pub status: ConfigStatus,
    pub is_active: bool,
}

impl From<ConfigRecord> for ConfigView {
    fn from(record: ConfigRecord) -> Self {
        Self {
            config_id: record.config_id,
            is_active: record.is_active(),
            status: record.status,
            config_name: record.name.unwrap_or_default(),
            config: record.payload,
        }
    }
}

fn parse_id(raw: &str) -> Result<ConfigId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid config ID".to_string()))
}

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ApiResponse<Vec<ConfigView>>, ApiError> {
    let configs = state
        .store
        .list_configs(principal.subject_id)
        .await
        .map_err(|e| ApiError::store(e, NOT_FOUND, "Failed to fetch configs"))?;
    Ok(ApiResponse::ok(
        "Configs retrieved",
        configs.into_iter().map(ConfigView::from).collect(),
    ))
}

pub async fn active(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ApiResponse<ConfigView>, ApiError> {
    let config = state
        .store
        .get_active_config(principal.subject_id)
        .await
        .map_err(|e| ApiError::store(e, "No active config found", "Failed to fetch config"))?;
    Ok(ApiResponse::ok("Active config retrieved", config.into()))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    body: Result<Json<CreateConfigRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = json_body(body)?;
    if req.config_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Config name is required".to_string()));
    }

    let config = state
        .store
        .create_config(
            principal.subject_id,
            &req.config_name,
            &req.config.unwrap_or_default(),
        )
        .await
        .map_err(|e| ApiError::store(e, NOT_FOUND, "Failed to create config"))?;

    tracing::debug!(
        "created config {} for {}",
        config.config_id,
        principal.subject_id
    );
    Ok(ApiResponse::ok("Config created", ConfigView::from(config)).with_status(StatusCode::CREATED))
}

pub async fn get(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<ApiResponse<ConfigView>, ApiError> {
    let config_id = parse_id(&id)?;
    let config = state
        .store
        .get_config(principal.subject_id, config_id)
        .await
        .map_err(|e| ApiError::store(e, NOT_FOUND, "Failed to fetch config"))?;
    Ok(ApiResponse::ok("Config retrieved", config.into()))
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    body: Result<Json<UpdateConfigRequest>, JsonRejection>,
) -> Result<ApiResponse<ConfigView>, ApiError> {
    let config_id = parse_id(&id)?;
    let req = json_body(body)?;
    let patch = ConfigPatch {
        name: req.config_name.filter(|name| !name.trim().is_empty()),
        payload: req.config,
    };

    let config = state
        .store
        .update_config(principal.subject_id, config_id, &patch)
        .await
        .map_err(|e| ApiError::store(e, NOT_FOUND, "Failed to update config"))?;
    Ok(ApiResponse::ok("Config updated", config.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let config_id = parse_id(&id)?;
    state
        .store
        .delete_config(principal.subject_id, config_id)
        .await
        .map_err(|e| ApiError::store(e, NOT_FOUND, "Failed to delete config"))?;
    Ok(ApiResponse::ack("Config deleted"))
}

pub async fn activate(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<ApiResponse<ConfigView>, ApiError> {
    let config_id = parse_id(&id)?;
    let config = state
        .store
        .activate_config(principal.subject_id, config_id)
        .await
        .map_err(|e| ApiError::store(e, NOT_FOUND, "Failed to activate config"))?;

    tracing::info!("activated config {config_id} for {}", principal.subject_id);
    Ok(ApiResponse::ok("Config activated", config.into()))
}

pub async fn deactivate(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let config_id = parse_id(&id)?;
    state
        .store
        .deactivate_config(principal.subject_id, config_id)
        .await
        .map_err(|e| ApiError::store(e, NOT_FOUND, "Failed to deactivate config"))?;
    Ok(ApiResponse::ack("Config deactivated"))
}
