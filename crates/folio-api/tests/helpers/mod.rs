//! In-memory collaborators for coordinator and router tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use folio_api::auth::{JwtService, UserRole};
use folio_api::services::{PageCountProbe, PageRenderCoordinator, PageRenderSettings};
use folio_api::state::{AppState, DbState, RenderState, SecurityConfig};
use folio_core::models::{
    ArtifactKind, AssetScope, BatchProgress, Document, RenderBatchHandle,
};
use folio_core::{AppError, DispatchError, RenderJobDispatcher, StorageBackend};
use folio_db::DocumentStore;
use folio_infra::{DispatchLockStore, InMemoryLockStore, LockError, LockResult};
use folio_storage::{Storage, StorageError, StorageResult};

pub const JWT_SECRET: &str = "test-secret-with-at-least-32-characters!";

// ----- Storage -----

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    fail_exists: AtomicBool,
    pub exists_calls: AtomicUsize,
}

impl FakeStorage {
    pub fn put(&self, key: &str, data: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, "application/octet-stream".to_string()));
    }

    pub fn get(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn set_fail_exists(&self, fail: bool) {
        self.fail_exists.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for FakeStorage {
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.get(storage_key)
            .map(|(data, _)| data)
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        self.objects
            .lock()
            .unwrap()
            .insert(storage_key.to_string(), (data, content_type.to_string()));
        Ok(format!("https://files.test/{}", storage_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "https://files.test/{}?expires_in={}",
            storage_key,
            expires_in.as_secs()
        ))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_exists.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("connection reset".to_string()));
        }
        Ok(self.contains(storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

// ----- Documents -----

#[derive(Default)]
pub struct FakeDocumentStore {
    documents: Mutex<HashMap<Uuid, Document>>,
    fail_record: AtomicBool,
    pub record_calls: AtomicUsize,
    pub flag_calls: AtomicUsize,
}

impl FakeDocumentStore {
    pub fn insert(&self, document: Document) {
        self.documents.lock().unwrap().insert(document.id, document);
    }

    pub fn get(&self, id: Uuid) -> Option<Document> {
        self.documents.lock().unwrap().get(&id).cloned()
    }

    pub fn set_fail_record(&self, fail: bool) {
        self.fail_record.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FakeDocumentStore {
    async fn get_document(
        &self,
        scope: AssetScope,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError> {
        Ok(self.get(document_id).filter(|doc| scope.allows(doc)))
    }

    async fn record_page_count(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        page_count: u32,
    ) -> Result<Option<u32>, AppError> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_record.load(Ordering::SeqCst) {
            return Err(AppError::Internal("write failed".to_string()));
        }
        let mut documents = self.documents.lock().unwrap();
        let Some(doc) = documents
            .get_mut(&document_id)
            .filter(|doc| doc.tenant_id == tenant_id)
        else {
            return Ok(None);
        };
        if doc.page_count.is_none() {
            doc.page_count = Some(page_count as i32);
        }
        Ok(doc.known_page_count())
    }

    async fn mark_unsupported_large(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<bool, AppError> {
        self.flag_calls.fetch_add(1, Ordering::SeqCst);
        let mut documents = self.documents.lock().unwrap();
        match documents
            .get_mut(&document_id)
            .filter(|doc| doc.tenant_id == tenant_id)
        {
            Some(doc) if !doc.pdf_unsupported_large => {
                doc.pdf_unsupported_large = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ----- Page count probe -----

pub struct FakeProbe {
    result: Mutex<Result<u32, String>>,
    pub calls: AtomicUsize,
}

impl FakeProbe {
    pub fn returning(page_count: u32) -> Self {
        Self {
            result: Mutex::new(Ok(page_count)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Mutex::new(Err(message.to_string())),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageCountProbe for FakeProbe {
    async fn probe(&self, _document: &Document) -> anyhow::Result<u32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .lock()
            .unwrap()
            .clone()
            .map_err(|e| anyhow::anyhow!(e))
    }
}

// ----- Dispatcher -----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedPage {
    pub scope: AssetScope,
    pub document_id: Uuid,
    pub page: u32,
    pub kind: ArtifactKind,
}

#[derive(Debug, Clone)]
pub struct DispatchedBatch {
    pub document_id: Uuid,
    pub kind: ArtifactKind,
    pub pages: Vec<u32>,
    pub total_jobs: u32,
    pub batch_id: Uuid,
}

pub struct RecordingDispatcher {
    pub pages: Mutex<Vec<DispatchedPage>>,
    pub batches: Mutex<Vec<DispatchedBatch>>,
    fail_dispatch: AtomicBool,
    max_batch_jobs: usize,
}

impl Default for RecordingDispatcher {
    fn default() -> Self {
        Self::with_batch_limit(2000)
    }
}

impl RecordingDispatcher {
    pub fn with_batch_limit(max_batch_jobs: usize) -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            fail_dispatch: AtomicBool::new(false),
            max_batch_jobs,
        }
    }

    pub fn set_fail_dispatch(&self, fail: bool) {
        self.fail_dispatch.store(fail, Ordering::SeqCst);
    }

    pub fn page_jobs(&self) -> Vec<DispatchedPage> {
        self.pages.lock().unwrap().clone()
    }

    pub fn page_job_count(&self) -> usize {
        self.pages.lock().unwrap().len()
    }

    pub fn batch_jobs(&self) -> Vec<DispatchedBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderJobDispatcher for RecordingDispatcher {
    async fn dispatch_page(
        &self,
        scope: AssetScope,
        document_id: Uuid,
        page: u32,
        kind: ArtifactKind,
    ) -> anyhow::Result<Uuid> {
        if self.fail_dispatch.load(Ordering::SeqCst) {
            anyhow::bail!("task queue unavailable");
        }
        self.pages.lock().unwrap().push(DispatchedPage {
            scope,
            document_id,
            page,
            kind,
        });
        Ok(Uuid::new_v4())
    }

    async fn dispatch_batch(
        &self,
        _scope: AssetScope,
        document_id: Uuid,
        kind: ArtifactKind,
        pages: Vec<u32>,
        total_jobs: u32,
    ) -> Result<RenderBatchHandle, DispatchError> {
        if self.fail_dispatch.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("task queue unavailable").into());
        }
        if pages.len() > self.max_batch_jobs {
            return Err(DispatchError::Rejected(format!(
                "Batch of {} jobs exceeds the maximum of {} jobs per batch",
                pages.len(),
                self.max_batch_jobs
            )));
        }
        let batch_id = Uuid::new_v4();
        let pending_jobs = pages.len() as u32;
        self.batches.lock().unwrap().push(DispatchedBatch {
            document_id,
            kind,
            pages,
            total_jobs,
            batch_id,
        });
        Ok(RenderBatchHandle {
            batch_id,
            total_jobs,
            pending_jobs,
        })
    }

    async fn batch_progress(
        &self,
        _scope: AssetScope,
        document_id: Uuid,
        batch_id: Uuid,
    ) -> anyhow::Result<Option<BatchProgress>> {
        Ok(self
            .batches
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.batch_id == batch_id && b.document_id == document_id)
            .map(|b| BatchProgress {
                batch_id,
                total_jobs: b.total_jobs,
                pending_jobs: b.pages.len() as u32,
                completed_jobs: b.total_jobs - b.pages.len() as u32,
                failed_jobs: 0,
            }))
    }
}

// ----- Lock store that is always down -----

pub struct UnavailableLockStore;

#[async_trait]
impl DispatchLockStore for UnavailableLockStore {
    async fn acquire_if_absent(&self, _key: &str, _ttl: Duration) -> LockResult<bool> {
        Err(LockError::Unavailable("connection refused".to_string()))
    }

    async fn release(&self, _key: &str) -> LockResult<()> {
        Err(LockError::Unavailable("connection refused".to_string()))
    }
}

// ----- Fixtures -----

pub fn pdf_document(tenant_id: Uuid, page_count: Option<i32>) -> Document {
    let id = Uuid::new_v4();
    Document {
        id,
        tenant_id,
        brand_id: None,
        original_filename: "handbook.pdf".to_string(),
        storage_key: format!("tenants/{}/uploads/{}.pdf", tenant_id, id),
        content_type: "application/pdf".to_string(),
        file_size: 4096,
        page_count,
        pdf_unsupported_large: false,
        uploaded_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn token(tenant_id: Uuid, brand_id: Option<Uuid>, role: UserRole) -> String {
    JwtService::new(JWT_SECRET)
        .issue(Uuid::new_v4(), tenant_id, brand_id, role, 3600)
        .unwrap()
}

/// Coordinator wired to fakes, plus handles to inspect them.
pub struct Harness {
    pub documents: Arc<FakeDocumentStore>,
    pub storage: Arc<FakeStorage>,
    pub probe: Arc<FakeProbe>,
    pub locks: Arc<dyn DispatchLockStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub coordinator: Arc<PageRenderCoordinator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(
            FakeProbe::returning(1),
            Arc::new(InMemoryLockStore::new()),
            RecordingDispatcher::default(),
            PageRenderSettings::default(),
        )
    }

    pub fn build(
        probe: FakeProbe,
        locks: Arc<dyn DispatchLockStore>,
        dispatcher: RecordingDispatcher,
        settings: PageRenderSettings,
    ) -> Self {
        let documents = Arc::new(FakeDocumentStore::default());
        let storage = Arc::new(FakeStorage::default());
        let probe = Arc::new(probe);
        let dispatcher = Arc::new(dispatcher);
        let coordinator = Arc::new(PageRenderCoordinator::new(
            documents.clone(),
            probe.clone(),
            storage.clone(),
            locks.clone(),
            dispatcher.clone(),
            settings,
        ));
        Self {
            documents,
            storage,
            probe,
            locks,
            dispatcher,
            coordinator,
        }
    }

    pub fn with_probe(probe: FakeProbe) -> Self {
        Self::build(
            probe,
            Arc::new(InMemoryLockStore::new()),
            RecordingDispatcher::default(),
            PageRenderSettings::default(),
        )
    }

    /// Store and return a PDF document for `tenant_id`.
    pub fn add_pdf(&self, tenant_id: Uuid, page_count: Option<i32>) -> Document {
        let doc = pdf_document(tenant_id, page_count);
        self.documents.insert(doc.clone());
        doc
    }

    pub fn artifact_key(&self, doc: &Document, page: u32, kind: ArtifactKind) -> String {
        kind.storage_key(doc.tenant_id, doc.id, page)
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            db: DbState {
                pool: None,
                documents: self.documents.clone(),
            },
            render: RenderState {
                coordinator: self.coordinator.clone(),
                dispatcher: self.dispatcher.clone(),
                storage: self.storage.clone(),
                url_signer: None,
            },
            security: SecurityConfig {
                jwt_secret: JWT_SECRET.to_string(),
                cors_origins: vec!["*".to_string()],
            },
            tasks: None,
        })
    }

    pub fn router(&self) -> axum::Router {
        folio_api::build_router(self.app_state(), 64)
    }
}
