use crate::auth::models::TenantContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::load_document;
use crate::state::{DbState, RenderState};
use axum::{
    extract::{Path, State},
    Json,
};
use folio_core::models::BatchProgress;
use folio_core::AppError;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/assets/{id}/pdf/batches/{batch_id}",
    tag = "pdf-pages",
    params(
        ("id" = Uuid, Path, description = "Document ID"),
        ("batch_id" = Uuid, Path, description = "Batch ID returned by extract-all")
    ),
    responses(
        (status = 200, description = "Batch progress", body = BatchProgress),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Document or batch not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(db, render, tenant_ctx),
    fields(tenant_id = %tenant_ctx.tenant_id, document_id = %id, batch_id = %batch_id)
)]
pub async fn get_batch_progress(
    State(db): State<DbState>,
    State(render): State<RenderState>,
    tenant_ctx: TenantContext,
    Path((id, batch_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BatchProgress>, HttpAppError> {
    let scope = tenant_ctx.scope();
    let document = load_document(db.documents.as_ref(), scope, id).await?;

    let progress = render
        .dispatcher
        .batch_progress(scope, document.id, batch_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch not found".to_string()))?;

    Ok(Json(progress))
}
