use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sequencer_core::{
    ProgressStore, Result, SequencerError, TaskProgress, TaskStatus, TransactionScope,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// Configuration for the PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 5,
            idle_timeout_seconds: 600, // 10 minutes
        }
    }
}

impl PostgresConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }
}

/// Creates a PostgreSQL connection pool from a configuration.
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(Some(Duration::from_secs(config.idle_timeout_seconds)))
        .connect(&config.database_url)
        .await?;

    tracing::info!(
        max = config.max_connections,
        min = config.min_connections,
        "PostgreSQL connection pool created"
    );

    Ok(pool)
}

/// PostgreSQL-backed progress store. Checkpoints are upserted by task name
/// into a single `task_progress` table, so a logical run never produces
/// duplicate rows. The transaction scope wraps writes in a real
/// `BEGIN`/`COMMIT` held by the store, keeping checkpoints durable
/// independent of any business transaction the task itself is using.
pub struct PostgresProgressStore {
    pool: PgPool,
    active_tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PostgresProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            active_tx: Mutex::new(None),
        }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Creates the `task_progress` table when it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_progress (
                task_name VARCHAR(255) PRIMARY KEY,
                status VARCHAR(50) NOT NULL,
                total_items BIGINT,
                processed_items BIGINT NOT NULL DEFAULT 0,
                last_processed_id VARCHAR(255),
                started_at TIMESTAMPTZ,
                completed_at TIMESTAMPTZ,
                error_message TEXT,
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::debug!("task_progress schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn check_task_name(task_name: &str) -> Result<()> {
        if task_name.is_empty() {
            return Err(SequencerError::Progress(
                "task name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for PostgresProgressStore {
    async fn save(&self, task_name: &str, progress: &TaskProgress) -> Result<()> {
        Self::check_task_name(task_name)?;
        if progress.task_name != task_name {
            return Err(SequencerError::Progress(format!(
                "task name mismatch: expected '{}', got '{}'",
                task_name, progress.task_name
            )));
        }

        let metadata = serde_json::to_value(&progress.metadata)?;
        let query = sqlx::query(
            r#"
            INSERT INTO task_progress (
                task_name, status, total_items, processed_items,
                last_processed_id, started_at, completed_at, error_message, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (task_name) DO UPDATE
            SET status = EXCLUDED.status,
                total_items = EXCLUDED.total_items,
                processed_items = EXCLUDED.processed_items,
                last_processed_id = EXCLUDED.last_processed_id,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at,
                error_message = EXCLUDED.error_message,
                metadata = EXCLUDED.metadata
            "#,
        )
        .bind(task_name)
        .bind(status_to_str(progress.status))
        .bind(progress.total_items.map(|v| v as i64))
        .bind(progress.processed_items as i64)
        .bind(progress.last_processed_id.as_deref())
        .bind(progress.started_at)
        .bind(progress.completed_at)
        .bind(progress.error_message.as_deref())
        .bind(metadata);

        let mut guard = self.active_tx.lock().await;
        match guard.as_mut() {
            Some(tx) => {
                query.execute(&mut **tx).await?;
            }
            None => {
                query.execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    async fn load(&self, task_name: &str) -> Result<Option<TaskProgress>> {
        Self::check_task_name(task_name)?;

        let query = sqlx::query(
            r#"
            SELECT task_name, status, total_items, processed_items,
                   last_processed_id, started_at, completed_at, error_message, metadata
            FROM task_progress
            WHERE task_name = $1
            "#,
        )
        .bind(task_name);

        let mut guard = self.active_tx.lock().await;
        let row = match guard.as_mut() {
            Some(tx) => query.fetch_optional(&mut **tx).await?,
            None => query.fetch_optional(&self.pool).await?,
        };

        Ok(row.map(row_to_progress))
    }

    async fn mark_completed(&self, task_name: &str) -> Result<()> {
        Self::check_task_name(task_name)?;

        // COALESCE keeps an already-recorded start time.
        let now = Utc::now();
        let query = sqlx::query(
            r#"
            INSERT INTO task_progress (task_name, status, processed_items, started_at, completed_at, metadata)
            VALUES ($1, $2, 0, $3, $3, '{}'::jsonb)
            ON CONFLICT (task_name) DO UPDATE
            SET status = EXCLUDED.status,
                completed_at = EXCLUDED.completed_at,
                started_at = COALESCE(task_progress.started_at, EXCLUDED.started_at)
            "#,
        )
        .bind(task_name)
        .bind(status_to_str(TaskStatus::Completed))
        .bind(now);

        let mut guard = self.active_tx.lock().await;
        match guard.as_mut() {
            Some(tx) => {
                query.execute(&mut **tx).await?;
            }
            None => {
                query.execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    async fn clear(&self, task_name: &str) -> Result<()> {
        Self::check_task_name(task_name)?;

        let query = sqlx::query("DELETE FROM task_progress WHERE task_name = $1").bind(task_name);

        let mut guard = self.active_tx.lock().await;
        match guard.as_mut() {
            Some(tx) => {
                query.execute(&mut **tx).await?;
            }
            None => {
                query.execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    async fn transaction<'a>(&'a self, scope: TransactionScope<'a>) -> Result<()> {
        {
            let mut guard = self.active_tx.lock().await;
            if guard.is_some() {
                // Nested scope joins the active transaction.
                drop(guard);
                return scope.await;
            }
            *guard = Some(self.pool.begin().await?);
        }

        let result = scope.await;

        let mut guard = self.active_tx.lock().await;
        if let Some(tx) = guard.take() {
            match &result {
                Ok(()) => tx.commit().await?,
                Err(_) => tx.rollback().await?,
            }
        }
        result
    }
}

/// Status representation used in the `status` column.
pub fn status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Cancelled => "cancelled",
    }
}

/// Inverse of [`status_to_str`]. Unknown strings map to `Pending`.
pub fn str_to_status(s: &str) -> TaskStatus {
    match s {
        "in_progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "cancelled" => TaskStatus::Cancelled,
        _ => TaskStatus::Pending,
    }
}

fn row_to_progress(row: PgRow) -> TaskProgress {
    let task_name: String = row.get("task_name");
    let status_str: String = row.get("status");
    let total_items: Option<i64> = row.get("total_items");
    let processed_items: i64 = row.get("processed_items");
    let last_processed_id: Option<String> = row.get("last_processed_id");
    let started_at: Option<DateTime<Utc>> = row.get("started_at");
    let completed_at: Option<DateTime<Utc>> = row.get("completed_at");
    let error_message: Option<String> = row.get("error_message");
    let metadata_json: serde_json::Value = row.get("metadata");
    let metadata: HashMap<String, serde_json::Value> =
        serde_json::from_value(metadata_json).unwrap_or_default();

    TaskProgress {
        task_name,
        status: str_to_status(&status_str),
        total_items: total_items.map(|v| v as u64),
        processed_items: processed_items as u64,
        last_processed_id,
        started_at,
        completed_at,
        error_message,
        metadata,
    }
}
