//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use folio_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    folio_infra::init_telemetry(config.is_production())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;
    let url_signer = storage::setup_url_signer(&config, storage.as_ref())?;
    let locks = folio_infra::create_lock_store(&config)
        .await
        .context("Failed to initialize dispatch lock store")?;

    let state = services::initialize_services(&config, pool, storage, url_signer, locks);

    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}
