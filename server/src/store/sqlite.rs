//! SQLite store backend.
//!
//! File databases run in WAL mode behind a pool of several connections, so
//! readers never wait for a writer and no process-wide lock sits in front of
//! the store. Activation starts with `BEGIN IMMEDIATE`: it takes SQLite's
//! write lock before reading anything, and concurrent activations queue on
//! that lock (bounded by the busy timeout) instead of failing on an upgrade.
//! SQLite has one write lock per database, so writes from different owners
//! still take turns for the length of a write transaction. Deployments that
//! need owners fully independent use the PostgreSQL backend.
//!
//! In-memory databases live on a single connection kept open for the life of
//! the store.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::rows::{
    BATCH_COLUMNS, BatchRow, CONFIG_COLUMNS, ConfigRow, JOB_COLUMNS, JobRow, USER_COLUMNS,
    UserRow, config_records,
};
use super::{
    BatchRecord, ConfigId, ConfigPatch, ConfigRecord, ConfigStatus, Document, JobFilter,
    JobRecord, NewUser, Page, PageRequest, Stats, Store, StoreError, UserId, UserRecord,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    pool: SqlitePool,
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:", 1).await
    }

    /// Open (creating if needed) the database at `url` and run migrations.
    ///
    /// File databases get up to `max_connections` pooled connections.
    pub async fn open(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let in_memory = is_in_memory(url);
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        let max_connections = if in_memory {
            1
        } else {
            if let Some(parent) = options.get_filename().parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Backend(format!("cannot create {parent:?}: {e}")))?;
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
            max_connections.max(1)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;

        tracing::debug!("sqlite store ready at {url} ({max_connections} connections)");
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn count(&self, sql: &str, owner: UserId) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(sql)
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn push_job_filter(builder: &mut QueryBuilder<'_, Sqlite>, owner: UserId, filter: &JobFilter) {
    builder.push(" WHERE user_id = ").push_bind(owner.0);
    if let Some(status) = &filter.status {
        builder.push(" AND job_status = ").push_bind(status.clone());
    }
    if let Some(batch_id) = &filter.batch_id {
        builder.push(" AND batch_id = ").push_bind(batch_id.clone());
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ───────────────────────────── Users ─────────────────────────────

    async fn create_user(&self, user: &NewUser) -> Result<UserRecord, StoreError> {
        let sql = format!(
            "INSERT INTO users (user_id, name, email, password_hash, google_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(UserId::new_random().0)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.google_id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn get_user(&self, user_id: UserId) -> Result<UserRecord, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?");
        let row: UserRow = sqlx::query_as(&sql)
            .bind(user_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    // ─────────────────────────── Configurations ──────────────────────────

    async fn create_config(
        &self,
        owner: UserId,
        name: &str,
        payload: &Document,
    ) -> Result<ConfigRecord, StoreError> {
        let sql = format!(
            "INSERT INTO global_job_config (config_id, user_id, config_name, config, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {CONFIG_COLUMNS}"
        );
        let row: ConfigRow = sqlx::query_as(&sql)
            .bind(ConfigId::new_random().0)
            .bind(owner.0)
            .bind(name)
            .bind(Json(payload))
            .bind(ConfigStatus::Inactive.as_str())
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn list_configs(&self, owner: UserId) -> Result<Vec<ConfigRecord>, StoreError> {
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM global_job_config WHERE user_id = ? ORDER BY rowid"
        );
        let rows: Vec<ConfigRow> = sqlx::query_as(&sql)
            .bind(owner.0)
            .fetch_all(&self.pool)
            .await?;
        config_records(rows)
    }

    async fn get_config(
        &self,
        owner: UserId,
        config_id: ConfigId,
    ) -> Result<ConfigRecord, StoreError> {
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM global_job_config WHERE config_id = ? AND user_id = ?"
        );
        let row: ConfigRow = sqlx::query_as(&sql)
            .bind(config_id.0)
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn get_active_config(&self, owner: UserId) -> Result<ConfigRecord, StoreError> {
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM global_job_config WHERE user_id = ? AND status = 'active'"
        );
        let row: ConfigRow = sqlx::query_as(&sql)
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn update_config(
        &self,
        owner: UserId,
        config_id: ConfigId,
        patch: &ConfigPatch,
    ) -> Result<ConfigRecord, StoreError> {
        if patch.is_empty() {
            return self.get_config(owner, config_id).await;
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE global_job_config SET ");
        let mut fields = builder.separated(", ");
        if let Some(name) = &patch.name {
            fields.push("config_name = ").push_bind_unseparated(name.clone());
        }
        if let Some(payload) = &patch.payload {
            fields
                .push("config = ")
                .push_bind_unseparated(Json(payload.clone()));
        }
        builder
            .push(" WHERE config_id = ")
            .push_bind(config_id.0)
            .push(" AND user_id = ")
            .push_bind(owner.0)
            .push(" RETURNING ")
            .push(CONFIG_COLUMNS);

        let row: ConfigRow = builder.build_query_as().fetch_one(&self.pool).await?;
        row.try_into()
    }

    async fn delete_config(&self, owner: UserId, config_id: ConfigId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM global_job_config WHERE config_id = ? AND user_id = ?")
            .bind(config_id.0)
            .bind(owner.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn activate_config(
        &self,
        owner: UserId,
        config_id: ConfigId,
    ) -> Result<ConfigRecord, StoreError> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        sqlx::query(
            "UPDATE global_job_config SET status = 'inactive' WHERE user_id = ? AND status = 'active'",
        )
        .bind(owner.0)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "UPDATE global_job_config SET status = 'active'
             WHERE config_id = ? AND user_id = ? RETURNING {CONFIG_COLUMNS}"
        );
        let row: Option<ConfigRow> = sqlx::query_as(&sql)
            .bind(config_id.0)
            .bind(owner.0)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        };
        let record = ConfigRecord::try_from(row)?;

        tx.commit().await?;
        Ok(record)
    }

    async fn deactivate_config(
        &self,
        owner: UserId,
        config_id: ConfigId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE global_job_config SET status = 'inactive' WHERE config_id = ? AND user_id = ?",
        )
        .bind(config_id.0)
        .bind(owner.0)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ───────────────────────────── Jobs ─────────────────────────────

    async fn list_jobs(
        &self,
        owner: UserId,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<JobRecord>, StoreError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM jobs");
        push_job_filter(&mut count, owner, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {JOB_COLUMNS} FROM jobs"));
        push_job_filter(&mut select, owner, filter);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows: Vec<JobRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page {
            items: rows.into_iter().map(Into::into).collect(),
            total,
        })
    }

    async fn get_job(&self, owner: UserId, job_id: &str) -> Result<JobRecord, StoreError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = ? AND user_id = ?");
        let row: JobRow = sqlx::query_as(&sql)
            .bind(job_id)
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn stats(&self, owner: UserId) -> Result<Stats, StoreError> {
        Ok(Stats {
            total_jobs: self
                .count("SELECT COUNT(*) FROM jobs WHERE user_id = ?", owner)
                .await?,
            accepted_jobs: self
                .count(
                    "SELECT COUNT(*) FROM jobs WHERE user_id = ? AND job_status = 'accepted'",
                    owner,
                )
                .await?,
            rejected_jobs: self
                .count(
                    "SELECT COUNT(*) FROM jobs WHERE user_id = ? AND job_status = 'rejected'",
                    owner,
                )
                .await?,
            total_batches: self
                .count("SELECT COUNT(*) FROM batch WHERE user_id = ?", owner)
                .await?,
            total_configs: self
                .count("SELECT COUNT(*) FROM global_job_config WHERE user_id = ?", owner)
                .await?,
            active_configs: self
                .count(
                    "SELECT COUNT(*) FROM global_job_config WHERE user_id = ? AND status = 'active'",
                    owner,
                )
                .await?,
        })
    }

    // ───────────────────────────── Batches ─────────────────────────────

    async fn list_batches(
        &self,
        owner: UserId,
        page: PageRequest,
    ) -> Result<Page<BatchRecord>, StoreError> {
        let total = self
            .count("SELECT COUNT(*) FROM batch WHERE user_id = ?", owner)
            .await?;

        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM batch WHERE user_id = ?
             ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );
        let rows: Vec<BatchRow> = sqlx::query_as(&sql)
            .bind(owner.0)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows.into_iter().map(Into::into).collect(),
            total,
        })
    }

    async fn get_batch(&self, owner: UserId, batch_id: &str) -> Result<BatchRecord, StoreError> {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM batch WHERE batch_id = ? AND user_id = ?");
        let row: BatchRow = sqlx::query_as(&sql)
            .bind(batch_id)
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }
}
