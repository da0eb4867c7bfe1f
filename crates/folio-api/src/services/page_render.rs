//! Page render-or-serve coordination.
//!
//! For one (document, page, kind) the coordinator answers with a link to the
//! rendered artifact, a "processing" marker while a render is in flight, or a
//! typed rejection. Renders are never awaited: the first caller to find the
//! artifact missing takes a short dispatch lock and submits one job, and
//! every caller polls until the artifact appears.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use folio_core::models::{
    ArtifactKind, AssetScope, Document, ExtractionOutcome, PageOutcome, RejectReason,
};
use folio_core::{AppError, Config, DispatchError, RenderJobDispatcher};
use folio_db::DocumentStore;
use folio_infra::DispatchLockStore;
use folio_storage::Storage;

use crate::auth::UserRole;

/// Concurrent storage probes while collecting missing pages for extract-all.
const EXTRACT_ALL_PROBE_CONCURRENCY: usize = 16;

/// Discovers the page count of a document whose count is not cached yet.
#[async_trait]
pub trait PageCountProbe: Send + Sync {
    async fn probe(&self, document: &Document) -> anyhow::Result<u32>;
}

/// Downloads the source PDF and counts its pages with lopdf.
pub struct StoragePageCountProbe {
    storage: Arc<dyn Storage>,
}

impl StoragePageCountProbe {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl PageCountProbe for StoragePageCountProbe {
    #[tracing::instrument(skip(self, document), fields(document_id = %document.id))]
    async fn probe(&self, document: &Document) -> anyhow::Result<u32> {
        let data = self.storage.download(&document.storage_key).await?;
        let page_count = folio_processing::probe_page_count(data).await?;
        Ok(page_count)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageRenderSettings {
    /// Documents with more pages are flagged unsupported-large.
    pub max_pages: u32,
    pub lock_ttl: Duration,
    pub url_ttl: Duration,
}

impl PageRenderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_pages: config.pdf_max_pages(),
            lock_ttl: Duration::from_secs(config.pdf_page_lock_ttl_secs()),
            url_ttl: Duration::from_secs(config.pdf_page_url_ttl_secs()),
        }
    }
}

impl Default for PageRenderSettings {
    fn default() -> Self {
        Self {
            max_pages: folio_core::config::DEFAULT_PDF_MAX_PAGES,
            lock_ttl: Duration::from_secs(folio_core::config::DEFAULT_PDF_PAGE_LOCK_TTL_SECS),
            url_ttl: Duration::from_secs(folio_core::config::DEFAULT_PDF_PAGE_URL_TTL_SECS),
        }
    }
}

pub struct PageRenderCoordinator {
    documents: Arc<dyn DocumentStore>,
    probe: Arc<dyn PageCountProbe>,
    storage: Arc<dyn Storage>,
    locks: Arc<dyn DispatchLockStore>,
    dispatcher: Arc<dyn RenderJobDispatcher>,
    settings: PageRenderSettings,
}

impl PageRenderCoordinator {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        probe: Arc<dyn PageCountProbe>,
        storage: Arc<dyn Storage>,
        locks: Arc<dyn DispatchLockStore>,
        dispatcher: Arc<dyn RenderJobDispatcher>,
        settings: PageRenderSettings,
    ) -> Self {
        Self {
            documents,
            probe,
            storage,
            locks,
            dispatcher,
            settings,
        }
    }

    pub fn settings(&self) -> &PageRenderSettings {
        &self.settings
    }

    /// Serve page `page` of `document` if rendered, otherwise make sure a
    /// render is on its way.
    ///
    /// Rejections are returned as [`PageOutcome::Rejected`]; `Err` is reserved
    /// for infrastructure faults.
    #[tracing::instrument(
        skip(self, document),
        fields(tenant_id = %scope.tenant_id, document_id = %document.id, page, kind = %kind)
    )]
    pub async fn resolve_page(
        &self,
        scope: AssetScope,
        document: &Document,
        page: i64,
        kind: ArtifactKind,
    ) -> Result<PageOutcome, AppError> {
        if page < 1 {
            return Ok(PageOutcome::Rejected(RejectReason::InvalidPage));
        }

        let page_count = match self.validate_document(scope, document).await {
            Ok(page_count) => page_count,
            Err(reason) => return Ok(PageOutcome::Rejected(reason)),
        };

        let page = match u32::try_from(page) {
            Ok(page) if page <= page_count => page,
            _ => {
                return Ok(PageOutcome::Rejected(RejectReason::PageExceedsCount {
                    page,
                    page_count,
                }))
            }
        };

        let storage_key = kind.storage_key(scope.tenant_id, document.id, page);
        if self.artifact_exists(&storage_key).await {
            let url = self
                .storage
                .get_presigned_url(&storage_key, self.settings.url_ttl)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
            return Ok(PageOutcome::Ready {
                url,
                page,
                page_count,
            });
        }

        self.request_render(scope, document.id, page, kind).await?;

        Ok(PageOutcome::Processing { page, page_count })
    }

    /// Queue every not-yet-rendered page of `document` as one batch.
    #[tracing::instrument(
        skip(self, document),
        fields(tenant_id = %scope.tenant_id, document_id = %document.id, kind = %kind)
    )]
    pub async fn extract_all(
        &self,
        scope: AssetScope,
        role: UserRole,
        document: &Document,
        kind: ArtifactKind,
    ) -> Result<ExtractionOutcome, AppError> {
        if !role.is_admin() {
            return Err(AppError::Forbidden(format!(
                "Role {} may not extract all pages",
                role
            )));
        }

        let page_count = match self.validate_document(scope, document).await {
            Ok(page_count) => page_count,
            Err(reason) => return Ok(ExtractionOutcome::Rejected(reason)),
        };

        let missing: Vec<u32> = stream::iter(1..=page_count)
            .map(|page| async move {
                let key = kind.storage_key(scope.tenant_id, document.id, page);
                (page, self.artifact_exists(&key).await)
            })
            .buffered(EXTRACT_ALL_PROBE_CONCURRENCY)
            .filter_map(|(page, exists)| async move { (!exists).then_some(page) })
            .collect()
            .await;

        let (pages, locked) = self.lock_pages(document.id, kind, missing).await?;

        tracing::info!(
            page_count,
            missing = pages.len(),
            "Submitting extract-all batch"
        );

        match self
            .dispatcher
            .dispatch_batch(scope, document.id, kind, pages, page_count)
            .await
        {
            Ok(handle) => Ok(ExtractionOutcome::Started(handle)),
            Err(DispatchError::Rejected(message)) => {
                tracing::info!(reason = %message, "Job runtime rejected extract-all batch");
                self.release_locks(&locked).await;
                Ok(ExtractionOutcome::RuntimeRejected(message))
            }
            Err(DispatchError::Failed(e)) => {
                tracing::error!(error = %e, "Failed to submit extract-all batch");
                self.release_locks(&locked).await;
                Err(AppError::JobDispatch(e.to_string()))
            }
        }
    }

    /// Take the dispatch lock of every missing page so single-page requests
    /// do not queue a second render while the batch runs. Pages whose lock is
    /// already held have a render in flight and are left out of the batch.
    ///
    /// Returns the pages to submit and the lock keys taken for them.
    async fn lock_pages(
        &self,
        document_id: Uuid,
        kind: ArtifactKind,
        missing: Vec<u32>,
    ) -> Result<(Vec<u32>, Vec<String>), AppError> {
        let mut pages = Vec::with_capacity(missing.len());
        let mut locked = Vec::with_capacity(missing.len());

        for page in missing {
            let lock_key = kind.dispatch_lock_key(document_id, page);
            match self
                .locks
                .acquire_if_absent(&lock_key, self.settings.lock_ttl)
                .await
            {
                Ok(true) => {
                    pages.push(page);
                    locked.push(lock_key);
                }
                Ok(false) => {
                    tracing::debug!(lock_key = %lock_key, "Render already in flight, skipping page");
                }
                Err(e) => {
                    tracing::error!(error = %e, lock_key = %lock_key, "Dispatch lock unavailable");
                    self.release_locks(&locked).await;
                    return Err(AppError::DispatchLock(e.to_string()));
                }
            }
        }

        Ok((pages, locked))
    }

    async fn release_locks(&self, lock_keys: &[String]) {
        for lock_key in lock_keys {
            if let Err(e) = self.locks.release(lock_key).await {
                tracing::warn!(
                    error = %e,
                    lock_key = %lock_key,
                    "Failed to release dispatch lock after failed dispatch"
                );
            }
        }
    }

    /// Document-level checks shared by single-page and extract-all requests.
    /// Returns the page count when the document can be rendered.
    async fn validate_document(
        &self,
        scope: AssetScope,
        document: &Document,
    ) -> Result<u32, RejectReason> {
        if !document.is_pdf() {
            return Err(RejectReason::NotPdf);
        }

        let page_count = self
            .resolve_page_count(scope, document)
            .await
            .ok_or(RejectReason::PageCountUnavailable)?;

        if document.pdf_unsupported_large || page_count > self.settings.max_pages {
            if !document.pdf_unsupported_large {
                self.flag_unsupported_large(scope, document.id, page_count)
                    .await;
            }
            return Err(RejectReason::UnsupportedLarge { page_count });
        }

        Ok(page_count)
    }

    /// Cached page count, or probe the source and cache the result.
    async fn resolve_page_count(&self, scope: AssetScope, document: &Document) -> Option<u32> {
        if let Some(page_count) = document.known_page_count() {
            return Some(page_count);
        }

        let probed = match self.probe.probe(document).await {
            Ok(page_count) if page_count > 0 => page_count,
            Ok(_) => {
                tracing::warn!("Page count probe returned zero pages");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Page count probe failed");
                return None;
            }
        };

        match self
            .documents
            .record_page_count(scope.tenant_id, document.id, probed)
            .await
        {
            // A concurrent request may have stored its count first; that one wins
            Ok(Some(stored)) => Some(stored),
            Ok(None) => Some(probed),
            Err(e) => {
                tracing::warn!(error = %e, page_count = probed, "Failed to persist page count");
                Some(probed)
            }
        }
    }

    async fn flag_unsupported_large(&self, scope: AssetScope, document_id: Uuid, page_count: u32) {
        match self
            .documents
            .mark_unsupported_large(scope.tenant_id, document_id)
            .await
        {
            Ok(_) => tracing::info!(
                page_count,
                max_pages = self.settings.max_pages,
                "PDF exceeds page limit"
            ),
            Err(e) => tracing::warn!(error = %e, "Failed to flag PDF as unsupported large"),
        }
    }

    /// Probe errors count as "absent" so the page gets re-rendered.
    async fn artifact_exists(&self, storage_key: &str) -> bool {
        match self.storage.exists(storage_key).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(error = %e, storage_key, "Artifact existence probe failed");
                false
            }
        }
    }

    async fn request_render(
        &self,
        scope: AssetScope,
        document_id: Uuid,
        page: u32,
        kind: ArtifactKind,
    ) -> Result<(), AppError> {
        let lock_key = kind.dispatch_lock_key(document_id, page);
        let acquired = self
            .locks
            .acquire_if_absent(&lock_key, self.settings.lock_ttl)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, lock_key = %lock_key, "Dispatch lock unavailable");
                AppError::DispatchLock(e.to_string())
            })?;

        if !acquired {
            tracing::debug!(lock_key = %lock_key, "Render already in flight");
            return Ok(());
        }

        match self
            .dispatcher
            .dispatch_page(scope, document_id, page, kind)
            .await
        {
            Ok(task_id) => {
                tracing::debug!(task_id = %task_id, "Render job dispatched");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to dispatch render job");
                self.release_locks(std::slice::from_ref(&lock_key)).await;
                Err(AppError::JobDispatch(e.to_string()))
            }
        }
    }
}
