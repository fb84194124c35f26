//! Read-only views over batches, and the jobs inside one batch.

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::jobs::JobView;
use crate::api::pagination::{DEFAULT_PER_PAGE, NESTED_DEFAULT_PER_PAGE, PageQuery};
use crate::api::{ApiError, ApiResponse, AppState, Paginated};
use crate::auth::Principal;
use crate::store::{BatchRecord, JobFilter, UserId};

const NOT_FOUND: &str = "Batch not found";

#[derive(Debug, Serialize)]
pub struct BatchView {
    pub batch_id: String,
    pub batch_name: String,
    pub user_id: UserId,
    pub created_at: Option<DateTime<Utc>>,
    pub total_jobs: i32,
    pub admitted_jobs: i32,
    pub rejected_jobs: i32,
}

impl From<BatchRecord> for BatchView {
    fn from(batch: BatchRecord) -> Self {
        let total_jobs = batch.total_jobs.unwrap_or_default();
        let admitted_jobs = batch.admitted_jobs.unwrap_or_default();
        Self {
            batch_id: batch.batch_id,
            batch_name: batch.batch_name.unwrap_or_default(),
            user_id: batch.user_id,
            created_at: batch.created_at,
            total_jobs,
            admitted_jobs,
            rejected_jobs: total_jobs.saturating_sub(admitted_jobs),
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<PageQuery>,
) -> Result<Paginated<BatchView>, ApiError> {
    let request = query.resolve(DEFAULT_PER_PAGE);
    let page = state
        .store
        .list_batches(principal.subject_id, request)
        .await
        .map_err(|e| ApiError::store(e, NOT_FOUND, "Failed to fetch batches"))?;

    Ok(Paginated::new(
        page.items.into_iter().map(BatchView::from).collect(),
        request,
        page.total,
    ))
}

pub async fn get(
    State(state): State<AppState>,
    principal: Principal,
    Path(batch_id): Path<String>,
) -> Result<ApiResponse<BatchView>, ApiError> {
    let batch = state
        .store
        .get_batch(principal.subject_id, &batch_id)
        .await
        .map_err(|e| ApiError::store(e, NOT_FOUND, "Failed to fetch batch"))?;
    Ok(ApiResponse::ok("Batch retrieved", batch.into()))
}

/// Jobs of one batch, newest first. The batch must belong to the caller.
pub async fn jobs(
    State(state): State<AppState>,
    principal: Principal,
    Path(batch_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Paginated<JobView>, ApiError> {
    state
        .store
        .get_batch(principal.subject_id, &batch_id)
        .await
        .map_err(|e| ApiError::store(e, NOT_FOUND, "Failed to fetch batch"))?;

    let request = query.resolve(NESTED_DEFAULT_PER_PAGE);
    let filter = JobFilter {
        status: None,
        batch_id: Some(batch_id),
    };
    let page = state
        .store
        .list_jobs(principal.subject_id, &filter, request)
        .await
        .map_err(|e| ApiError::store(e, NOT_FOUND, "Failed to fetch jobs"))?;

    Ok(Paginated::new(
        page.items.into_iter().map(JobView::from).collect(),
        request,
        page.total,
    ))
}
