//! Data models for the application
//!
//! Documents and the per-page artifacts derived from them, the typed
//! outcomes of page resolution, and background task records.

mod artifact;
mod document;
mod page;
mod task;

pub use artifact::*;
pub use document::*;
pub use page::*;
pub use task::*;
