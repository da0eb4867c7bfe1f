//! Folio Core Library
//!
//! This crate provides the domain models, error types and configuration
//! shared across all Folio components.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod task_error;

// Re-export commonly used types
pub use config::{BaseConfig, Config, RenderServiceConfig};
pub use dispatch::{DispatchError, RenderJobDispatcher};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::{DispatchLockBackend, StorageBackend};
pub use task_error::{TaskError, TaskResultExt};
// Storage, StorageError and StorageResult live in folio-storage
