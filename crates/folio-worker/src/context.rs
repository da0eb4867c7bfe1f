//! Task handler context trait
//!
//! The API implements this trait for its application state. The worker calls
//! `dispatch_task` for every claimed task; the implementation matches on the
//! task type and runs the handler.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use folio_core::models::Task;

/// Context for task dispatch.
///
/// The worker holds a weak reference so the pool never keeps application
/// state alive on its own.
#[async_trait]
pub trait TaskHandlerContext: Send + Sync {
    /// Run the handler for `task` and return its JSON result.
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value>;
}
