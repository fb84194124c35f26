//! Raw row shapes shared by both backends and their conversion into records.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::StoreError;
use super::types::{
    BatchRecord, ConfigId, ConfigRecord, ConfigStatus, Document, JobRecord, UserId, UserRecord,
};

pub const USER_COLUMNS: &str = "user_id, name, email, password_hash, google_id, created_at";
pub const CONFIG_COLUMNS: &str = "config_id, user_id, config_name, config, status, created_at";
pub const JOB_COLUMNS: &str =
    "job_id, user_id, job_payload, batch_id, job_status, reason, created_at, global_config_id";
pub const BATCH_COLUMNS: &str =
    "batch_id, batch_name, user_id, created_at, total_jobs, admitted_jobs";

#[derive(sqlx::FromRow)]
pub struct UserRow {
    user_id: Uuid,
    name: String,
    email: Option<String>,
    password_hash: Option<String>,
    google_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            google_id: row.google_id,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct ConfigRow {
    config_id: Uuid,
    user_id: Uuid,
    config_name: Option<String>,
    config: Json<Document>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ConfigRow> for ConfigRecord {
    type Error = StoreError;

    fn try_from(row: ConfigRow) -> Result<Self, Self::Error> {
        Ok(Self {
            config_id: ConfigId(row.config_id),
            owner_id: UserId(row.user_id),
            name: row.config_name,
            payload: row.config.0,
            status: row.status.parse::<ConfigStatus>().map_err(StoreError::Backend)?,
            created_at: row.created_at,
        })
    }
}

/// Convert a batch of config rows, failing on the first malformed one.
pub fn config_records(rows: Vec<ConfigRow>) -> Result<Vec<ConfigRecord>, StoreError> {
    rows.into_iter().map(ConfigRecord::try_from).collect()
}

#[derive(sqlx::FromRow)]
pub struct JobRow {
    job_id: String,
    user_id: Uuid,
    job_payload: Option<Json<serde_json::Value>>,
    batch_id: Option<String>,
    job_status: String,
    reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    global_config_id: Option<Uuid>,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        Self {
            job_id: row.job_id,
            user_id: UserId(row.user_id),
            payload: row.job_payload.map(|json| json.0),
            batch_id: row.batch_id,
            status: row.job_status,
            reason: row.reason,
            created_at: row.created_at,
            global_config_id: row.global_config_id.map(ConfigId),
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct BatchRow {
    batch_id: String,
    batch_name: Option<String>,
    user_id: Uuid,
    created_at: Option<DateTime<Utc>>,
    total_jobs: Option<i32>,
    admitted_jobs: Option<i32>,
}

impl From<BatchRow> for BatchRecord {
    fn from(row: BatchRow) -> Self {
        Self {
            batch_id: row.batch_id,
            batch_name: row.batch_name,
            user_id: UserId(row.user_id),
            created_at: row.created_at,
            total_jobs: row.total_jobs,
            admitted_jobs: row.admitted_jobs,
        }
    }
}
