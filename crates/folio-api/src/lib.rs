//! Folio API Library
//!
//! HTTP handlers, the page render coordinator, the render task handler and
//! application setup.

mod api_doc;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod services;
pub mod setup;
pub mod state;
mod task_dispatch;
pub mod task_handlers;

pub use error::{ErrorResponse, HttpAppError};
pub use services::{PageCountProbe, PageRenderCoordinator, PageRenderSettings};
pub use setup::routes::build_router;
pub use task_handlers::TaskHandler;
