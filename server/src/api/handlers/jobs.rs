//! Read-only views over jobs recorded by the execution service.

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::pagination::{self, DEFAULT_PER_PAGE};
use crate::api::{ApiError, ApiResponse, AppState, Paginated};
use crate::auth::Principal;
use crate::store::{ConfigId, JobFilter, JobRecord, Stats, UserId};

#[derive(Debug, Default, Deserialize)]
pub struct JobsQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub status: Option<String>,
    pub batch_id: Option<String>,
}

impl JobsQuery {
    fn filter(&self) -> JobFilter {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        JobFilter {
            status: non_empty(&self.status),
            batch_id: non_empty(&self.batch_id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: String,
    pub user_id: UserId,
    pub job_payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub job_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_config_id: Option<ConfigId>,
}

impl From<JobRecord> for JobView {
    fn from(job: JobRecord) -> Self {
        Self {
            job_id: job.job_id,
            user_id: job.user_id,
            job_payload: job.payload,
            batch_id: job.batch_id,
            job_status: job.status,
            reason: job.reason,
            created_at: job.created_at,
            global_config_id: job.global_config_id,
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<JobsQuery>,
) -> Result<Paginated<JobView>, ApiError> {
    let request = pagination::resolve(
        query.page.as_deref(),
        query.per_page.as_deref(),
        DEFAULT_PER_PAGE,
    );
    let page = state
        .store
        .list_jobs(principal.subject_id, &query.filter(), request)
        .await
        .map_err(|e| ApiError::store(e, "Job not found", "Failed to fetch jobs"))?;

    Ok(Paginated::new(
        page.items.into_iter().map(JobView::from).collect(),
        request,
        page.total,
    ))
}

pub async fn get(
    State(state): State<AppState>,
    principal: Principal,
    Path(job_id): Path<String>,
) -> Result<ApiResponse<JobView>, ApiError> {
    let job = state
        .store
        .get_job(principal.subject_id, &job_id)
        .await
        .map_err(|e| ApiError::store(e, "Job not found", "Failed to fetch job"))?;
    Ok(ApiResponse::ok("Job retrieved", job.into()))
}

pub async fn stats(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ApiResponse<Stats>, ApiError> {
    let stats = state
        .store
        .stats(principal.subject_id)
        .await
        .map_err(|e| ApiError::store(e, "Stats not found", "Failed to fetch stats"))?;
    Ok(ApiResponse::ok("Stats retrieved", stats))
}
