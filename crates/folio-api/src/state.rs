//! Application state and sub-state extractors.
//!
//! AppState is split into sub-states so handlers extract only what they need
//! through Axum's `FromRef`.

use folio_core::RenderJobDispatcher;
use folio_db::DocumentStore;
use folio_storage::{Storage, UrlSigner};
use folio_worker::TaskQueue;
use sqlx::PgPool;
use std::sync::Arc;

use crate::services::PageRenderCoordinator;

// ----- Sub-state types -----

/// Database pool and document lookups.
#[derive(Clone)]
pub struct DbState {
    /// `None` when the state was assembled without a database (router tests).
    pub pool: Option<PgPool>,
    pub documents: Arc<dyn DocumentStore>,
}

/// Everything the page endpoints and the render handler need.
#[derive(Clone)]
pub struct RenderState {
    pub coordinator: Arc<PageRenderCoordinator>,
    pub dispatcher: Arc<dyn RenderJobDispatcher>,
    pub storage: Arc<dyn Storage>,
    /// Verifies `/files` links; `None` when the backend presigns natively.
    pub url_signer: Option<Arc<UrlSigner>>,
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
}

/// Task queue handle, present when this process runs the worker pool.
#[derive(Clone)]
pub struct TaskState {
    pub task_queue: TaskQueue,
}

// ----- AppState -----

#[derive(Clone)]
pub struct AppState {
    pub db: DbState,
    pub render: RenderState,
    pub security: SecurityConfig,
    pub tasks: Option<TaskState>,
}

// ----- FromRef for sub-state extraction -----

impl axum::extract::FromRef<Arc<AppState>> for DbState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.db.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for RenderState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.render.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for SecurityConfig {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.security.clone()
    }
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
