use anyhow::{Context, Result};
use folio_core::models::{
    ArtifactKind, AssetScope, BatchProgress, RenderBatch, RenderPdfPagePayload, TaskStatus,
    TaskType,
};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::task::notify_workers;

/// Scheduling settings applied to every task of a batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchTaskOptions {
    pub priority: i32,
    pub max_retries: i32,
    pub timeout_seconds: Option<i32>,
}

#[derive(sqlx::FromRow)]
struct BatchProgressRow {
    id: Uuid,
    total_jobs: i32,
    pending_jobs: i32,
    completed_tasks: i64,
    failed_tasks: i64,
}

impl BatchProgressRow {
    /// Pages skipped at submission (total - submitted) already had an
    /// artifact and count as completed.
    fn into_progress(self) -> BatchProgress {
        let total = self.total_jobs.max(0) as u32;
        let submitted = (self.pending_jobs.max(0) as u32).min(total);
        let completed = (total - submitted) + self.completed_tasks.max(0) as u32;
        let failed = self.failed_tasks.max(0) as u32;
        BatchProgress {
            batch_id: self.id,
            total_jobs: total,
            pending_jobs: total.saturating_sub(completed + failed),
            completed_jobs: completed.min(total),
            failed_jobs: failed,
        }
    }
}

#[derive(Clone)]
pub struct RenderBatchRepository {
    pool: PgPool,
}

impl RenderBatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a batch and enqueue one render task per page, atomically.
    ///
    /// `total_jobs` is the document's page count; `pages` are the pages that
    /// still need rendering.
    #[tracing::instrument(skip(self, pages), fields(tenant_id = %scope.tenant_id, pages = pages.len()))]
    pub async fn create_batch(
        &self,
        scope: AssetScope,
        document_id: Uuid,
        kind: ArtifactKind,
        pages: &[u32],
        total_jobs: u32,
        options: BatchTaskOptions,
    ) -> Result<RenderBatch> {
        let payloads = pages
            .iter()
            .map(|page| {
                serde_json::to_value(RenderPdfPagePayload {
                    document_id,
                    page: *page,
                    kind,
                    brand_id: scope.brand_id,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to serialize render task payloads")?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for render batch")?;

        let batch = sqlx::query_as::<Postgres, RenderBatch>(
            r#"
            INSERT INTO render_batches (tenant_id, document_id, artifact_kind, total_jobs, pending_jobs)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, tenant_id, document_id, artifact_kind, total_jobs, pending_jobs, created_at
            "#,
        )
        .bind(scope.tenant_id)
        .bind(document_id)
        .bind(kind.as_str())
        .bind(total_jobs as i32)
        .bind(payloads.len() as i32)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert render batch")?;

        if !payloads.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO tasks (
                    tenant_id, task_type, status, priority, payload, scheduled_at,
                    max_retries, timeout_seconds, batch_id
                )
                SELECT $1, $2, $3, $4, payload, NOW(), $5, $6, $7
                FROM UNNEST($8::jsonb[]) AS payload
                "#,
            )
            .bind(scope.tenant_id)
            .bind(TaskType::RenderPdfPage.to_string())
            .bind(TaskStatus::Pending)
            .bind(options.priority)
            .bind(options.max_retries)
            .bind(options.timeout_seconds)
            .bind(batch.id)
            .bind(&payloads)
            .execute(&mut *tx)
            .await
            .context("Failed to insert render batch tasks")?;

            notify_workers(&mut tx).await;
        }

        tx.commit()
            .await
            .context("Failed to commit render batch")?;

        tracing::info!(
            batch_id = %batch.id,
            document_id = %document_id,
            kind = %kind,
            total_jobs,
            pending_jobs = batch.pending_jobs,
            "Render batch created"
        );

        Ok(batch)
    }

    /// Progress of a batch belonging to `document_id` in the caller's tenant.
    #[tracing::instrument(skip(self))]
    pub async fn get_progress(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        batch_id: Uuid,
    ) -> Result<Option<BatchProgress>> {
        let row = sqlx::query_as::<Postgres, BatchProgressRow>(
            r#"
            SELECT
                b.id,
                b.total_jobs,
                b.pending_jobs,
                COUNT(t.id) FILTER (WHERE t.status = 'completed') AS completed_tasks,
                COUNT(t.id) FILTER (WHERE t.status IN ('failed', 'cancelled')) AS failed_tasks
            FROM render_batches b
            LEFT JOIN tasks t ON t.batch_id = b.id
            WHERE b.tenant_id = $1
                AND b.document_id = $2
                AND b.id = $3
            GROUP BY b.id
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch render batch progress")?;

        Ok(row.map(BatchProgressRow::into_progress))
    }
}
