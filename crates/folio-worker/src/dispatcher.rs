//! [`RenderJobDispatcher`] backed by the task queue.

use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use folio_core::dispatch::{DispatchError, RenderJobDispatcher};
use folio_core::models::{
    ArtifactKind, AssetScope, BatchProgress, Priority, RenderBatchHandle, RenderPdfPagePayload,
    TaskPayload,
};
use folio_db::BatchTaskOptions;

use crate::queue::TaskQueue;

/// Refuse batches larger than the queue accepts in one submission.
pub(crate) fn check_batch_size(jobs: usize, max_batch_jobs: usize) -> Result<(), DispatchError> {
    if jobs > max_batch_jobs {
        return Err(DispatchError::Rejected(format!(
            "Batch of {} jobs exceeds the maximum of {} jobs per batch",
            jobs, max_batch_jobs
        )));
    }
    Ok(())
}

#[async_trait]
impl RenderJobDispatcher for TaskQueue {
    async fn dispatch_page(
        &self,
        scope: AssetScope,
        document_id: Uuid,
        page: u32,
        kind: ArtifactKind,
    ) -> anyhow::Result<Uuid> {
        let payload = serde_json::to_value(RenderPdfPagePayload {
            document_id,
            page,
            kind,
            brand_id: scope.brand_id,
        })
        .context("Failed to serialize render task payload")?;

        self.submit_task(
            scope.tenant_id,
            RenderPdfPagePayload::task_type(),
            payload,
            Priority::Normal,
            None,
        )
        .await
    }

    async fn dispatch_batch(
        &self,
        scope: AssetScope,
        document_id: Uuid,
        kind: ArtifactKind,
        pages: Vec<u32>,
        total_jobs: u32,
    ) -> Result<RenderBatchHandle, DispatchError> {
        check_batch_size(pages.len(), self.config.max_batch_jobs)?;

        // Bulk extraction yields to interactive page requests
        let options = BatchTaskOptions {
            priority: Priority::Low.as_i32(),
            max_retries: self.config.max_retries,
            timeout_seconds: Some(self.config.default_timeout_seconds),
        };

        let batch = self
            .batches
            .create_batch(scope, document_id, kind, &pages, total_jobs, options)
            .await?;

        Ok(batch.handle())
    }

    async fn batch_progress(
        &self,
        scope: AssetScope,
        document_id: Uuid,
        batch_id: Uuid,
    ) -> anyhow::Result<Option<BatchProgress>> {
        self.batches
            .get_progress(scope.tenant_id, document_id, batch_id)
            .await
    }
}
