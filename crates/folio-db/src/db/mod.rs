//! Database repositories for data access layer
//!
//! Each repository is responsible for one table and takes the tenant as an
//! explicit argument on every tenant-facing query. Worker-side methods that
//! operate on a task id alone are marked as system methods.

pub mod document;
pub mod render_batch;
pub mod task;

pub use document::{DocumentRepository, DocumentStore};
pub use render_batch::{BatchTaskOptions, RenderBatchRepository};
pub use task::{NewTask, TaskRepository, TASK_NOTIFY_CHANNEL};
