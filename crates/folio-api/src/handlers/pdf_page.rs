use crate::auth::models::TenantContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::{load_document, rejection_response, KindQuery, RejectionResponse};
use crate::state::{DbState, RenderState};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use folio_core::models::PageOutcome;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// 200 body of the page endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PdfPageResponse {
    /// The artifact exists; `url` expires after a short time.
    Ready {
        url: String,
        page: u32,
        page_count: u32,
    },
    /// A render is on its way. Poll again.
    Processing { page: u32, page_count: u32 },
}

/// Page numbers are parsed as signed integers; anything unparseable is
/// treated as page 0 and rejected as an invalid page.
pub(crate) fn parse_page_number(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(0)
}

#[utoipa::path(
    get,
    path = "/assets/{id}/pdf-page/{page}",
    tag = "pdf-pages",
    params(
        ("id" = Uuid, Path, description = "Document ID"),
        ("page" = String, Path, description = "1-based page number"),
        KindQuery
    ),
    responses(
        (status = 200, description = "Page ready or being rendered", body = PdfPageResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 422, description = "Page cannot be served", body = RejectionResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(db, render, tenant_ctx, query),
    fields(tenant_id = %tenant_ctx.tenant_id, document_id = %id, page = %page)
)]
pub async fn get_pdf_page(
    State(db): State<DbState>,
    State(render): State<RenderState>,
    tenant_ctx: TenantContext,
    Path((id, page)): Path<(Uuid, String)>,
    Query(query): Query<KindQuery>,
) -> Result<Response, HttpAppError> {
    let scope = tenant_ctx.scope();
    let document = load_document(db.documents.as_ref(), scope, id).await?;

    let outcome = render
        .coordinator
        .resolve_page(scope, &document, parse_page_number(&page), query.kind())
        .await?;

    let response = match outcome {
        PageOutcome::Ready {
            url,
            page,
            page_count,
        } => Json(PdfPageResponse::Ready {
            url,
            page,
            page_count,
        })
        .into_response(),
        PageOutcome::Processing { page, page_count } => {
            Json(PdfPageResponse::Processing { page, page_count }).into_response()
        }
        PageOutcome::Rejected(reason) => {
            tracing::debug!(reason = %reason.message(), "Page request rejected");
            rejection_response(&reason)
        }
    };

    Ok(response)
}
