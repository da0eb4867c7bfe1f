//! Routes claimed tasks to their handlers.

use crate::state::AppState;
use crate::task_handlers::{RenderPageTaskHandler, TaskHandler};
use anyhow::Result;
use async_trait::async_trait;
use folio_core::models::{Task, TaskType};
use folio_worker::TaskHandlerContext;
use std::sync::Arc;

#[async_trait]
impl TaskHandlerContext for AppState {
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value> {
        match task.task_type {
            TaskType::RenderPdfPage => RenderPageTaskHandler.process(task, self).await,
        }
    }
}
