//! Folio Infrastructure Library
//!
//! Shared infrastructure components used by the Folio services:
//! - Middleware (request ID)
//! - Tracing initialization
//! - Dispatch lock stores (in-memory and Redis)

#[cfg(feature = "middleware")]
pub mod middleware;

pub mod telemetry;

pub mod lock;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::{request_id_middleware, RequestId, REQUEST_ID_HEADER};

pub use telemetry::{init_telemetry, shutdown_telemetry};

pub use lock::{create_lock_store, DispatchLockStore, InMemoryLockStore, LockError, LockResult};
#[cfg(feature = "redis-lock")]
pub use lock::RedisLockStore;
