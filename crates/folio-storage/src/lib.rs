//! Folio Storage Library
//!
//! This crate provides the storage abstraction and its S3 and local
//! filesystem implementations.
//!
//! # Storage key format
//!
//! Keys are built by callers and are tenant-scoped. Rendered page artifacts
//! live under `tenants/{tenant_id}/pdf-pages/{document_id}/{kind}/`.
//! Keys must not contain `..` segments or a leading `/`; every backend checks
//! this through the shared `keys` module.
//!
//! The local backend has no native presigning; its links are signed with
//! [`UrlSigner`] and served by the API's `/files` route.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod signing;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use folio_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use signing::{SignatureError, UrlSigner};
pub use traits::{Storage, StorageError, StorageResult};
