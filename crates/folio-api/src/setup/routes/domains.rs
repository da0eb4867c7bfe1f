//! PDF page route group.

use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn pdf_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/assets/{id}/pdf-page/{page}",
            get(handlers::pdf_page::get_pdf_page),
        )
        .route(
            "/assets/{id}/pdf/extract-all",
            post(handlers::pdf_extract::extract_all_pages),
        )
        .route(
            "/assets/{id}/pdf/batches/{batch_id}",
            get(handlers::batch_status::get_batch_progress),
        )
}
