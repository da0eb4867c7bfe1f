//! Render job dispatcher trait.
//!
//! The page coordinator submits work through this trait and never waits for
//! it. The production implementation is the PostgreSQL-backed task queue in
//! `folio-worker`; tests substitute a recording fake.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{ArtifactKind, AssetScope, BatchProgress, RenderBatchHandle};

/// Failure submitting a batch of render jobs.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The job runtime refused the batch. The message is safe to show clients.
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Submits page render jobs to the background job runtime.
#[async_trait]
pub trait RenderJobDispatcher: Send + Sync {
    /// Submit one render job. Returns the job id.
    async fn dispatch_page(
        &self,
        scope: AssetScope,
        document_id: Uuid,
        page: u32,
        kind: ArtifactKind,
    ) -> anyhow::Result<Uuid>;

    /// Submit one job per page in `pages` as a single batch.
    ///
    /// `total_jobs` is the document's page count; pages that already have an
    /// artifact are not in `pages` but still count towards it.
    async fn dispatch_batch(
        &self,
        scope: AssetScope,
        document_id: Uuid,
        kind: ArtifactKind,
        pages: Vec<u32>,
        total_jobs: u32,
    ) -> Result<RenderBatchHandle, DispatchError>;

    /// Progress of a batch, or `None` when it does not exist for this
    /// document in the caller's tenant.
    async fn batch_progress(
        &self,
        scope: AssetScope,
        document_id: Uuid,
        batch_id: Uuid,
    ) -> anyhow::Result<Option<BatchProgress>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_is_verbatim() {
        let err = DispatchError::Rejected("Batch of 3000 jobs exceeds limit 2000".to_string());
        assert_eq!(err.to_string(), "Batch of 3000 jobs exceeds limit 2000");
    }

    #[test]
    fn test_failed_wraps_anyhow() {
        let err: DispatchError = anyhow::anyhow!("connection reset").into();
        assert!(matches!(err, DispatchError::Failed(_)));
        assert_eq!(err.to_string(), "connection reset");
    }
}
