//! PostgreSQL store backend.
//!
//! Activation locks every configuration row of the owner with
//! `SELECT ... FOR UPDATE` before touching statuses. Two activations for the
//! same owner therefore queue on those row locks, and the second one only
//! proceeds once the first has committed or rolled back. Owners never share
//! rows, so activations for different owners do not wait on each other.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::rows::{
    BATCH_COLUMNS, BatchRow, CONFIG_COLUMNS, ConfigRow, JOB_COLUMNS, JobRow, USER_COLUMNS,
    UserRow, config_records,
};
use super::{
    BatchRecord, ConfigId, ConfigPatch, ConfigRecord, ConfigStatus, Document, JobFilter,
    JobRecord, NewUser, Page, PageRequest, Stats, Store, StoreError, UserId, UserRecord,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgres");

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn open(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        MIGRATOR.run(&pool).await?;

        tracing::debug!("postgres store ready ({max_connections} connections)");
        Ok(Self { pool })
    }
}

// Payloads are written as text cast to `json`, which keeps the document
// byte-for-byte (key order included). `jsonb` would reorder keys.
fn payload_text(payload: &Document) -> Result<String, StoreError> {
    serde_json::to_string(payload).map_err(|e| StoreError::Backend(e.to_string()))
}

fn push_job_filter(builder: &mut QueryBuilder<'_, Postgres>, owner: UserId, filter: &JobFilter) {
    builder.push(" WHERE user_id = ").push_bind(owner.0);
    if let Some(status) = &filter.status {
        builder.push(" AND job_status = ").push_bind(status.clone());
    }
    if let Some(batch_id) = &filter.batch_id {
        builder.push(" AND batch_id = ").push_bind(batch_id.clone());
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ───────────────────────────── Users ─────────────────────────────

    async fn create_user(&self, user: &NewUser) -> Result<UserRecord, StoreError> {
        let sql = format!(
            "INSERT INTO users (user_id, name, email, password_hash, google_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
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
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn get_user(&self, user_id: UserId) -> Result<UserRecord, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
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
             VALUES ($1, $2, $3, $4::json, $5, $6) RETURNING {CONFIG_COLUMNS}"
        );
        let row: ConfigRow = sqlx::query_as(&sql)
            .bind(ConfigId::new_random().0)
            .bind(owner.0)
            .bind(name)
            .bind(payload_text(payload)?)
            .bind(ConfigStatus::Inactive.as_str())
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn list_configs(&self, owner: UserId) -> Result<Vec<ConfigRecord>, StoreError> {
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM global_job_config WHERE user_id = $1
             ORDER BY created_at, config_id"
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
            "SELECT {CONFIG_COLUMNS} FROM global_job_config WHERE config_id = $1 AND user_id = $2"
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
            "SELECT {CONFIG_COLUMNS} FROM global_job_config WHERE user_id = $1 AND status = 'active'"
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

        let payload = patch.payload.as_ref().map(payload_text).transpose()?;

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE global_job_config SET ");
        let mut fields = builder.separated(", ");
        if let Some(name) = &patch.name {
            fields.push("config_name = ").push_bind_unseparated(name.clone());
        }
        if let Some(payload) = payload {
            fields
                .push("config = ")
                .push_bind_unseparated(payload)
                .push_unseparated("::json");
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
        let result =
            sqlx::query("DELETE FROM global_job_config WHERE config_id = $1 AND user_id = $2")
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
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT config_id FROM global_job_config WHERE user_id = $1 FOR UPDATE")
            .bind(owner.0)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE global_job_config SET status = 'inactive' WHERE user_id = $1 AND status = 'active'",
        )
        .bind(owner.0)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "UPDATE global_job_config SET status = 'active'
             WHERE config_id = $1 AND user_id = $2 RETURNING {CONFIG_COLUMNS}"
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
            "UPDATE global_job_config SET status = 'inactive' WHERE config_id = $1 AND user_id = $2",
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
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM jobs");
        push_job_filter(&mut count, owner, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {JOB_COLUMNS} FROM jobs"));
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
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1 AND user_id = $2");
        let row: JobRow = sqlx::query_as(&sql)
            .bind(job_id)
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn stats(&self, owner: UserId) -> Result<Stats, StoreError> {
        let (total_jobs, accepted_jobs, rejected_jobs): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE job_status = 'accepted'),
                    COUNT(*) FILTER (WHERE job_status = 'rejected')
             FROM jobs WHERE user_id = $1",
        )
        .bind(owner.0)
        .fetch_one(&self.pool)
        .await?;

        let (total_batches,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM batch WHERE user_id = $1")
                .bind(owner.0)
                .fetch_one(&self.pool)
                .await?;

        let (total_configs, active_configs): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'active')
             FROM global_job_config WHERE user_id = $1",
        )
        .bind(owner.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(Stats {
            total_jobs,
            accepted_jobs,
            rejected_jobs,
            total_batches,
            total_configs,
            active_configs,
        })
    }

    // ───────────────────────────── Batches ─────────────────────────────

    async fn list_batches(
        &self,
        owner: UserId,
        page: PageRequest,
    ) -> Result<Page<BatchRecord>, StoreError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM batch WHERE user_id = $1")
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM batch WHERE user_id = $1
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
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
        let sql = format!("SELECT {BATCH_COLUMNS} FROM batch WHERE batch_id = $1 AND user_id = $2");
        let row: BatchRow = sqlx::query_as(&sql)
            .bind(batch_id)
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }
}
