use super::TaskHandler;
use crate::state::AppState;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use folio_core::models::{AssetScope, PageArtifact, RenderPdfPagePayload, Task};
use folio_core::{TaskError, TaskResultExt};
use folio_db::DocumentStore;
use folio_storage::{Storage, StorageError};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Produces one page artifact and uploads it under the artifact key.
pub struct RenderPageTaskHandler;

#[async_trait]
impl TaskHandler for RenderPageTaskHandler {
    #[tracing::instrument(
        skip(self, task, state),
        fields(task.id = %task.id, document_id = tracing::field::Empty, page = tracing::field::Empty)
    )]
    async fn process(&self, task: &Task, state: Arc<AppState>) -> Result<serde_json::Value> {
        let payload: RenderPdfPagePayload = task
            .try_payload_as()
            .context("Invalid render task payload")
            .unrecoverable()?;

        tracing::Span::current().record("document_id", payload.document_id.to_string());
        tracing::Span::current().record("page", payload.page);

        let result = render_page(
            state.db.documents.as_ref(),
            state.render.storage.as_ref(),
            task.tenant_id,
            &payload,
        )
        .await?;

        Ok(result)
    }
}

/// Render one page artifact. Does nothing when the artifact already exists.
pub async fn render_page(
    documents: &dyn DocumentStore,
    storage: &dyn Storage,
    tenant_id: Uuid,
    payload: &RenderPdfPagePayload,
) -> Result<serde_json::Value, TaskError> {
    if payload.page == 0 {
        return Err(TaskError::unrecoverable(anyhow!("Page numbers start at 1")));
    }

    let scope = AssetScope::new(tenant_id, payload.brand_id);
    let document = documents
        .get_document(scope, payload.document_id)
        .await
        .map_err(|e| TaskError::recoverable(anyhow!(e)))?
        .ok_or_else(|| {
            TaskError::unrecoverable(anyhow!("Document {} not found", payload.document_id))
        })?;

    let target = PageArtifact::new(tenant_id, document.id, payload.page, payload.kind);
    let storage_key = target.storage_key.as_str();

    match storage.exists(storage_key).await {
        Ok(true) => {
            tracing::debug!(storage_key = %storage_key, "Artifact already present, skipping render");
            return Ok(json!({
                "storage_key": storage_key,
                "skipped": true,
            }));
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(error = %e, storage_key = %storage_key, "Artifact existence probe failed, rendering anyway");
        }
    }

    let source = storage
        .download(&document.storage_key)
        .await
        .map_err(|e| match e {
            StorageError::NotFound(_) | StorageError::InvalidKey(_) => {
                TaskError::unrecoverable(anyhow!("Source PDF unavailable: {}", e))
            }
            other => TaskError::recoverable(anyhow!("Failed to download source PDF: {}", other)),
        })?;

    let artifact = folio_processing::render_page_artifact(source, payload.page, payload.kind)
        .await
        .map_err(|e| {
            if e.is_retryable() {
                TaskError::recoverable(anyhow!(e))
            } else {
                TaskError::unrecoverable(anyhow!(e))
            }
        })?;

    let bytes = artifact.len();
    storage
        .upload_with_key(storage_key, artifact, target.content_type())
        .await
        .map_err(|e| TaskError::recoverable(anyhow!("Failed to upload page artifact: {}", e)))?;

    tracing::info!(
        storage_key = %storage_key,
        kind = %payload.kind,
        bytes,
        "Page artifact rendered"
    );

    Ok(json!({
        "storage_key": storage_key,
        "skipped": false,
        "bytes": bytes,
    }))
}
