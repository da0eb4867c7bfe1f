use crate::auth::models::TenantContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::{
    load_document, rejection_response, unprocessable, KindQuery, RejectionResponse,
};
use crate::state::{DbState, RenderState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use folio_core::models::ExtractionOutcome;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExtractAllResponse {
    /// Always `started`
    pub status: String,
    pub batch_id: Uuid,
    pub total_jobs: u32,
    pub pending_jobs: u32,
}

#[utoipa::path(
    post,
    path = "/assets/{id}/pdf/extract-all",
    tag = "pdf-pages",
    params(
        ("id" = Uuid, Path, description = "Document ID"),
        KindQuery
    ),
    responses(
        (status = 202, description = "Batch submitted", body = ExtractAllResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not a tenant admin", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 422, description = "Document cannot be extracted", body = RejectionResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(db, render, tenant_ctx, query),
    fields(tenant_id = %tenant_ctx.tenant_id, document_id = %id)
)]
pub async fn extract_all_pages(
    State(db): State<DbState>,
    State(render): State<RenderState>,
    tenant_ctx: TenantContext,
    Path(id): Path<Uuid>,
    Query(query): Query<KindQuery>,
) -> Result<Response, HttpAppError> {
    // Role is checked before the lookup so non-admins cannot probe for ids
    if !tenant_ctx.role.is_admin() {
        tracing::debug!(role = %tenant_ctx.role, "Extract-all refused for non-admin");
        return Err(folio_core::AppError::Forbidden(format!(
            "Role {} may not extract all pages",
            tenant_ctx.role
        ))
        .into());
    }

    let scope = tenant_ctx.scope();
    let document = load_document(db.documents.as_ref(), scope, id).await?;

    let outcome = render
        .coordinator
        .extract_all(scope, tenant_ctx.role, &document, query.kind())
        .await?;

    let response = match outcome {
        ExtractionOutcome::Started(handle) => {
            tracing::info!(
                batch_id = %handle.batch_id,
                total_jobs = handle.total_jobs,
                pending_jobs = handle.pending_jobs,
                "Extract-all started"
            );
            (
                StatusCode::ACCEPTED,
                Json(ExtractAllResponse {
                    status: "started".to_string(),
                    batch_id: handle.batch_id,
                    total_jobs: handle.total_jobs,
                    pending_jobs: handle.pending_jobs,
                }),
            )
                .into_response()
        }
        ExtractionOutcome::Rejected(reason) => rejection_response(&reason),
        ExtractionOutcome::RuntimeRejected(message) => unprocessable(RejectionResponse {
            status: None,
            message,
            page_count: None,
        }),
    };

    Ok(response)
}
