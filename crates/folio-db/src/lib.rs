//! PostgreSQL repositories for documents, render batches and the task queue.

pub mod db;
pub mod migrations;

pub use db::{
    BatchTaskOptions, DocumentRepository, DocumentStore, NewTask, RenderBatchRepository,
    TaskRepository, TASK_NOTIFY_CHANNEL,
};
pub use migrations::run_migrations;
