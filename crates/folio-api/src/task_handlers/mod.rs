pub mod render_page;

pub use render_page::RenderPageTaskHandler;

use crate::state::AppState;
use anyhow::Result;
use async_trait::async_trait;
use folio_core::models::Task;
use std::sync::Arc;

#[async_trait]
pub trait TaskHandler {
    async fn process(&self, task: &Task, state: Arc<AppState>) -> Result<serde_json::Value>;
}
