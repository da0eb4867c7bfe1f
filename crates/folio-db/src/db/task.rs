use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres};
use uuid::Uuid;

use folio_core::models::{Task, TaskStatus, TaskType};

/// Channel name for PostgreSQL LISTEN/NOTIFY when a new task is created.
pub const TASK_NOTIFY_CHANNEL: &str = "folio_new_task";

pub(crate) const TASK_COLUMNS: &str = r#"
    id,
    tenant_id,
    task_type,
    status,
    priority,
    payload,
    result,
    scheduled_at,
    started_at,
    completed_at,
    retry_count,
    max_retries,
    timeout_seconds,
    batch_id,
    created_at,
    updated_at
"#;

/// Fields of a task row to insert.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub tenant_id: Uuid,
    pub task_type: TaskType,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub max_retries: i32,
    pub timeout_seconds: Option<i32>,
    pub batch_id: Option<Uuid>,
}

/// Insert one task on an open connection or transaction. Does not notify.
pub(crate) async fn insert_task(conn: &mut PgConnection, new_task: &NewTask) -> Result<Task> {
    let now = Utc::now();
    let scheduled_at = new_task.scheduled_at.unwrap_or(now);
    let status = if scheduled_at > now {
        TaskStatus::Scheduled
    } else {
        TaskStatus::Pending
    };

    let sql = format!(
        r#"
        INSERT INTO tasks (
            tenant_id, task_type, status, priority, payload, scheduled_at,
            max_retries, timeout_seconds, batch_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
        "#,
        TASK_COLUMNS
    );

    sqlx::query_as::<Postgres, Task>(&sql)
        .bind(new_task.tenant_id)
        .bind(new_task.task_type.to_string())
        .bind(status)
        .bind(new_task.priority)
        .bind(&new_task.payload)
        .bind(scheduled_at)
        .bind(new_task.max_retries)
        .bind(new_task.timeout_seconds)
        .bind(new_task.batch_id)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                tenant_id = %new_task.tenant_id,
                task_type = %new_task.task_type,
                "Failed to insert task into database"
            );
            anyhow::anyhow!("Failed to insert task into database: {}", e)
        })
}

/// Wake listening workers. Failure is non-fatal: workers also poll.
pub(crate) async fn notify_workers(conn: &mut PgConnection) {
    if let Err(e) = sqlx::query("SELECT pg_notify($1, '')")
        .bind(TASK_NOTIFY_CHANNEL)
        .execute(conn)
        .await
    {
        tracing::warn!(
            error = %e,
            "Failed to send pg_notify for new task, workers will discover task via polling"
        );
    }
}

#[derive(Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new task and notify workers in the same transaction.
    #[tracing::instrument(skip(self, new_task), fields(tenant_id = %new_task.tenant_id, task_type = %new_task.task_type))]
    pub async fn create_task(&self, new_task: NewTask) -> Result<Task> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for task creation")?;

        let task = insert_task(&mut tx, &new_task).await?;
        notify_workers(&mut tx).await;

        tx.commit().await.map_err(|e| {
            tracing::error!(
                error = %e,
                task_id = %task.id,
                "Failed to commit transaction for task creation"
            );
            anyhow::anyhow!("Failed to commit transaction: {}", e)
        })?;

        tracing::info!(
            task_id = %task.id,
            tenant_id = %task.tenant_id,
            task_type = %task.task_type,
            priority = task.priority,
            "Task created"
        );

        Ok(task)
    }

    /// Get a task by ID with tenant check
    #[tracing::instrument(skip(self))]
    pub async fn get_task(&self, tenant_id: Uuid, task_id: Uuid) -> Result<Option<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE tenant_id = $1 AND id = $2",
            TASK_COLUMNS
        );
        sqlx::query_as::<Postgres, Task>(&sql)
            .bind(tenant_id)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch task")
    }

    /// Atomically claim the next available task across all tenants.
    ///
    /// Workers are shared between tenants; handlers re-check tenant ownership
    /// of everything a payload references.
    #[tracing::instrument(skip(self))]
    pub async fn claim_next_task(&self) -> Result<Option<Task>> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'running',
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = (
                SELECT id
                FROM tasks
                WHERE status IN ('pending', 'scheduled')
                    AND scheduled_at <= NOW()
                ORDER BY priority DESC, scheduled_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let task = sqlx::query_as::<Postgres, Task>(&sql)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to claim next task")?;

        if let Some(ref task) = task {
            tracing::debug!(
                task_id = %task.id,
                tenant_id = %task.tenant_id,
                task_type = %task.task_type,
                "Task claimed"
            );
        }

        Ok(task)
    }

    /// Mark task as completed with result (system method)
    #[tracing::instrument(skip(self, result))]
    pub async fn mark_completed(&self, task_id: Uuid, result: serde_json::Value) -> Result<Task> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'completed',
                result = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task_id)
            .bind(result)
            .fetch_one(&self.pool)
            .await
            .context("Failed to mark task as completed")?;

        tracing::info!(
            task_id = %task_id,
            tenant_id = %task.tenant_id,
            task_type = %task.task_type,
            "Task completed"
        );
        Ok(task)
    }

    /// Mark task as failed with error details (system method)
    #[tracing::instrument(skip(self, error))]
    pub async fn mark_failed(&self, task_id: Uuid, error: serde_json::Value) -> Result<Task> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'failed',
                result = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task_id)
            .bind(error)
            .fetch_one(&self.pool)
            .await
            .context("Failed to mark task as failed")?;

        tracing::error!(
            task_id = %task_id,
            tenant_id = %task.tenant_id,
            task_type = %task.task_type,
            retry_count = task.retry_count,
            "Task failed"
        );
        Ok(task)
    }

    /// Increment retry count and make the task claimable again after
    /// `backoff_seconds` (system method).
    #[tracing::instrument(skip(self))]
    pub async fn schedule_retry(&self, task_id: Uuid, backoff_seconds: u64) -> Result<Task> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'scheduled',
                retry_count = retry_count + 1,
                started_at = NULL,
                scheduled_at = NOW() + make_interval(secs => $2),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task_id)
            .bind(backoff_seconds as f64)
            .fetch_one(&self.pool)
            .await
            .context("Failed to schedule task retry")?;

        tracing::info!(
            task_id = %task_id,
            retry_count = task.retry_count,
            max_retries = task.max_retries,
            backoff_seconds,
            "Task retry scheduled"
        );
        Ok(task)
    }

    /// Recover tasks left `running` by a worker that died.
    ///
    /// A task is stale once it has run longer than its timeout plus
    /// `grace_period_secs`. Stale tasks with retries left go back to
    /// `pending`; the rest are marked failed. Returns the number of tasks
    /// touched.
    #[tracing::instrument(skip(self))]
    pub async fn reap_stale_running_tasks(&self, grace_period_secs: i64) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for stale task reaping")?;

        let requeued = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending',
                retry_count = retry_count + 1,
                started_at = NULL,
                updated_at = NOW()
            WHERE status = 'running'
                AND retry_count < max_retries
                AND started_at < NOW() - make_interval(secs => COALESCE(timeout_seconds, 3600) + $1)
            "#,
        )
        .bind(grace_period_secs as f64)
        .execute(&mut *tx)
        .await
        .context("Failed to requeue stale tasks")?
        .rows_affected();

        let failed = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'failed',
                result = jsonb_build_object(
                    'error', 'Task exceeded its timeout and its worker stopped reporting',
                    'retry_count', retry_count
                ),
                completed_at = NOW(),
                updated_at = NOW()
            WHERE status = 'running'
                AND retry_count >= max_retries
                AND started_at < NOW() - make_interval(secs => COALESCE(timeout_seconds, 3600) + $1)
            "#,
        )
        .bind(grace_period_secs as f64)
        .execute(&mut *tx)
        .await
        .context("Failed to fail stale tasks")?
        .rows_affected();

        if requeued > 0 {
            notify_workers(&mut tx).await;
        }

        tx.commit()
            .await
            .context("Failed to commit stale task reaping")?;

        if requeued + failed > 0 {
            tracing::warn!(requeued, failed, "Reaped stale running tasks");
        }

        Ok(requeued + failed)
    }
}
