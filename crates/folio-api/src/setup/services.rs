//! Repositories, the task queue and the page coordinator.

use crate::services::{PageRenderCoordinator, PageRenderSettings, StoragePageCountProbe};
use crate::state::{AppState, DbState, RenderState, SecurityConfig, TaskState};
use folio_core::{Config, RenderJobDispatcher};
use folio_db::{DocumentRepository, DocumentStore, RenderBatchRepository, TaskRepository};
use folio_infra::DispatchLockStore;
use folio_storage::{Storage, UrlSigner};
use folio_worker::{TaskHandlerContext, TaskQueue, TaskQueueConfig};
use sqlx::PgPool;
use std::sync::{Arc, Weak};

/// Build the application state.
///
/// The worker pool dispatches claimed tasks back into the state it belongs
/// to, so the queue is created with a weak reference to the state under
/// construction.
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
    url_signer: Option<Arc<UrlSigner>>,
    locks: Arc<dyn DispatchLockStore>,
) -> Arc<AppState> {
    let documents: Arc<dyn DocumentStore> = Arc::new(DocumentRepository::new(pool.clone()));
    let task_repository = TaskRepository::new(pool.clone());
    let batch_repository = RenderBatchRepository::new(pool.clone());
    let queue_config = TaskQueueConfig::from_config(config);
    let settings = PageRenderSettings::from_config(config);
    let probe = Arc::new(StoragePageCountProbe::new(storage.clone()));

    tracing::info!(
        max_pages = settings.max_pages,
        lock_ttl_secs = settings.lock_ttl.as_secs(),
        url_ttl_secs = settings.url_ttl.as_secs(),
        "Page render coordinator configured"
    );

    Arc::new_cyclic(|state: &Weak<AppState>| {
        let context: Weak<dyn TaskHandlerContext> = state.clone();
        let task_queue = TaskQueue::new(
            task_repository,
            batch_repository,
            queue_config.clone(),
            context,
            Some(pool.clone()),
        );
        tracing::info!(
            max_workers = queue_config.max_workers,
            max_batch_jobs = queue_config.max_batch_jobs,
            "Task queue system initialized successfully"
        );

        let dispatcher: Arc<dyn RenderJobDispatcher> = Arc::new(task_queue.clone());
        let coordinator = Arc::new(PageRenderCoordinator::new(
            documents.clone(),
            probe,
            storage.clone(),
            locks,
            dispatcher.clone(),
            settings,
        ));

        AppState {
            db: DbState {
                pool: Some(pool),
                documents,
            },
            render: RenderState {
                coordinator,
                dispatcher,
                storage,
                url_signer,
            },
            security: SecurityConfig {
                jwt_secret: config.jwt_secret().to_string(),
                cors_origins: config.cors_origins().to_vec(),
            },
            tasks: Some(TaskState { task_queue }),
        }
    })
}
