//! Domain records returned by the store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An opaque, ordered JSON object. Unknown keys and key order survive a
/// round-trip through the store.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Identifier of a user (the token subject).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a job configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(pub Uuid);

impl ConfigId {
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConfigId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Activation state of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigStatus {
    Active,
    Inactive,
}

impl ConfigStatus {
    /// The value stored in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for ConfigStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown config status '{other}'")),
        }
    }
}

impl fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored credential record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub name: String,
    pub email: Option<String>,
    /// `None` for accounts that only sign in through an external identity.
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for [`super::Store::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
}

/// A job configuration owned by one user.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRecord {
    pub config_id: ConfigId,
    pub owner_id: UserId,
    pub name: Option<String>,
    pub payload: Document,
    pub status: ConfigStatus,
    pub created_at: DateTime<Utc>,
}

impl ConfigRecord {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ConfigStatus::Active
    }
}

/// Partial update of a configuration. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ConfigPatch {
    pub name: Option<String>,
    pub payload: Option<Document>,
}

impl ConfigPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.payload.is_none()
    }
}

/// A job as recorded by the execution service.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_id: String,
    pub user_id: UserId,
    pub payload: Option<serde_json::Value>,
    pub batch_id: Option<String>,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub global_config_id: Option<ConfigId>,
}

/// A batch of jobs as recorded by the execution service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    pub batch_id: String,
    pub batch_name: Option<String>,
    pub user_id: UserId,
    pub created_at: Option<DateTime<Utc>>,
    pub total_jobs: Option<i32>,
    pub admitted_jobs: Option<i32>,
}

/// Optional filters for job listings.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<String>,
    pub batch_id: Option<String>,
}

/// Per-owner counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_jobs: i64,
    pub accepted_jobs: i64,
    pub rejected_jobs: i64,
    pub total_batches: i64,
    pub total_configs: i64,
    pub active_configs: i64,
}

/// A validated page window. `page` starts at 1, `per_page` is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    /// Build a window, raising zero values to 1.
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    #[must_use]
    pub const fn page(self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn per_page(self) -> u32 {
        self.per_page
    }

    /// Row limit, as bound into SQL.
    #[must_use]
    pub fn limit(self) -> i64 {
        i64::from(self.per_page)
    }

    /// Rows to skip, as bound into SQL.
    #[must_use]
    pub fn offset(self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

/// One page of rows plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}
