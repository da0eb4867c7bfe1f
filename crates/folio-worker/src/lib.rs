//! Background task queue for page rendering.
//!
//! Tasks live in the PostgreSQL `tasks` table. A bounded pool of workers
//! claims them and hands each one to a [`TaskHandlerContext`] implemented by
//! the API crate.

pub mod context;
pub mod dispatcher;
pub mod queue;

pub use context::TaskHandlerContext;
pub use queue::{TaskQueue, TaskQueueConfig, MAX_RETRY_BACKOFF_SECS};
