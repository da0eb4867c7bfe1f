//! Storage setup and initialization

use anyhow::{Context, Result};
use folio_core::Config;
use folio_storage::{create_storage, Storage, StorageBackend, UrlSigner};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(
        backend = ?storage.backend_type(),
        "Storage initialized successfully"
    );
    Ok(storage)
}

/// Verifier for `/files` links, present only when the local backend issues them.
pub fn setup_url_signer(
    config: &Config,
    storage: &dyn Storage,
) -> Result<Option<Arc<UrlSigner>>> {
    if storage.backend_type() != StorageBackend::Local {
        return Ok(None);
    }
    let signer = UrlSigner::new(config.jwt_secret()).context("Failed to initialize URL signer")?;
    tracing::info!("Signed file route enabled for local storage");
    Ok(Some(Arc::new(signer)))
}
