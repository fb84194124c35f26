//! Persistent store for credentials, job configurations, jobs and batches.
//!
//! The `Store` trait is the seam between request handling and the relational
//! backend. Two backends implement it:
//!
//! - [`postgres::PostgresStore`]: production backend. Activation takes
//!   row-level locks on the owner's configuration rows, so activations for
//!   the same owner serialize while other owners proceed in parallel.
//! - [`sqlite::SqliteStore`]: development and test backend. It runs on a
//!   single pooled connection, so every write transaction is serialized.
//!
//! # Invariants
//!
//! - For a given owner at most one configuration row has `status = 'active'`.
//!   Both schemas carry a partial unique index that rejects any commit which
//!   would break this.
//! - Every configuration query is scoped by owner; a row owned by someone
//!   else is reported exactly like a missing row.

mod rows;
pub mod postgres;
pub mod sqlite;
mod types;

#[cfg(test)]
pub(crate) mod conformance;

use std::sync::Arc;

use async_trait::async_trait;

pub use types::{
    BatchRecord, ConfigId, ConfigPatch, ConfigRecord, ConfigStatus, Document, JobFilter,
    JobRecord, NewUser, Page, PageRequest, Stats, UserId, UserRecord,
};

/// Uniform error type for all store backends.
#[derive(Debug)]
pub enum StoreError {
    /// No row matched, or the matching row belongs to another owner.
    NotFound,
    /// A unique constraint rejected the write.
    AlreadyExists,
    /// The store could not be reached (pool exhausted, connection refused).
    Unavailable(String),
    /// Any other backend failure.
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
            Self::Backend(reason) => write!(f, "backend error: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => Self::AlreadyExists,
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::Unavailable(e.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Backend(format!("migration failed: {e}"))
    }
}

/// Data access used by the HTTP handlers.
///
/// Every method that takes an owner only ever reads or writes rows whose
/// `user_id` equals that owner.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round-trip used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    // ───────────────────────────── Users ─────────────────────────────

    /// Insert a credential record. Fails with `AlreadyExists` on a duplicate
    /// email or external identity.
    async fn create_user(&self, user: &NewUser) -> Result<UserRecord, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn get_user(&self, user_id: UserId) -> Result<UserRecord, StoreError>;

    // ─────────────────────────── Configurations ──────────────────────────

    /// Create an inactive configuration.
    async fn create_config(
        &self,
        owner: UserId,
        name: &str,
        payload: &Document,
    ) -> Result<ConfigRecord, StoreError>;

    /// All configurations of `owner`, in insertion order.
    async fn list_configs(&self, owner: UserId) -> Result<Vec<ConfigRecord>, StoreError>;

    async fn get_config(
        &self,
        owner: UserId,
        config_id: ConfigId,
    ) -> Result<ConfigRecord, StoreError>;

    /// The owner's active configuration, `NotFound` when none is active.
    async fn get_active_config(&self, owner: UserId) -> Result<ConfigRecord, StoreError>;

    /// Apply a partial update. Never touches `status`.
    async fn update_config(
        &self,
        owner: UserId,
        config_id: ConfigId,
        patch: &ConfigPatch,
    ) -> Result<ConfigRecord, StoreError>;

    /// Remove a configuration in any state. No other record is promoted.
    async fn delete_config(&self, owner: UserId, config_id: ConfigId) -> Result<(), StoreError>;

    /// Make `config_id` the owner's only active configuration.
    ///
    /// Runs as one transaction: deactivate every active row of the owner,
    /// then activate the target. When the target does not exist for this
    /// owner the transaction is rolled back and `NotFound` is returned, so
    /// the previously active configuration stays active.
    async fn activate_config(
        &self,
        owner: UserId,
        config_id: ConfigId,
    ) -> Result<ConfigRecord, StoreError>;

    /// Mark a configuration inactive regardless of its current state.
    async fn deactivate_config(
        &self,
        owner: UserId,
        config_id: ConfigId,
    ) -> Result<(), StoreError>;

    // ───────────────────────────── Jobs ─────────────────────────────

    /// Newest first.
    async fn list_jobs(
        &self,
        owner: UserId,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<JobRecord>, StoreError>;

    async fn get_job(&self, owner: UserId, job_id: &str) -> Result<JobRecord, StoreError>;

    async fn stats(&self, owner: UserId) -> Result<Stats, StoreError>;

    // ───────────────────────────── Batches ─────────────────────────────

    /// Newest first.
    async fn list_batches(
        &self,
        owner: UserId,
        page: PageRequest,
    ) -> Result<Page<BatchRecord>, StoreError>;

    async fn get_batch(&self, owner: UserId, batch_id: &str) -> Result<BatchRecord, StoreError>;
}

/// Open the backend selected by the URL scheme and run its migrations.
///
/// `sqlite:` URLs open a [`sqlite::SqliteStore`]; `postgres:` and
/// `postgresql:` URLs open a [`postgres::PostgresStore`]. Both pool up to
/// `max_connections` connections (in-memory SQLite always uses one).
pub async fn connect(url: &str, max_connections: u32) -> Result<Arc<dyn Store>, StoreError> {
    if url.starts_with("sqlite:") {
        Ok(Arc::new(
            sqlite::SqliteStore::open(url, max_connections).await?,
        ))
    } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
        Ok(Arc::new(
            postgres::PostgresStore::open(url, max_connections).await?,
        ))
    } else {
        Err(StoreError::Backend(
            "unsupported database URL scheme (expected sqlite: or postgres:)".to_string(),
        ))
    }
}
