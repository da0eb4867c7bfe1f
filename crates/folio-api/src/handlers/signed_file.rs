//! Signed file route: serves local-storage artifacts by expiring link (no bearer token).
//! The `exp` and `sig` query parameters prove the link was issued by this service.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::RenderState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use chrono::Utc;
use folio_core::models::ArtifactKind;
use folio_core::AppError;
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SignedFileQuery {
    /// Unix timestamp after which the link is refused
    pub exp: i64,
    /// Hex HMAC-SHA256 over the key and `exp`
    pub sig: String,
}

fn content_type_for(storage_key: &str) -> &'static str {
    let extension = storage_key.rsplit_once('.').map(|(_, ext)| ext);
    ArtifactKind::ALL
        .iter()
        .find(|kind| Some(kind.extension()) == extension)
        .map(|kind| kind.content_type())
        .unwrap_or("application/octet-stream")
}

#[utoipa::path(
    get,
    path = "/files/{key}",
    tag = "pdf-pages",
    params(
        ("key" = String, Path, description = "Storage key of the artifact"),
        SignedFileQuery
    ),
    responses(
        (status = 200, description = "Artifact bytes"),
        (status = 403, description = "Link expired or signature invalid", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(render, query), fields(storage_key = %key))]
pub async fn get_signed_file(
    State(render): State<RenderState>,
    Path(key): Path<String>,
    Query(query): Query<SignedFileQuery>,
) -> Result<Response, HttpAppError> {
    let signer = render
        .url_signer
        .as_ref()
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    signer
        .verify(&key, query.exp, &query.sig, Utc::now().timestamp())
        .map_err(|e| AppError::Forbidden(e.to_string()))?;

    let data = render.storage.download(&key).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&key))
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(
            content_type_for("tenants/t/pdf-pages/d/pdf_page/page-00001.pdf"),
            "application/pdf"
        );
        assert_eq!(
            content_type_for("tenants/t/pdf-pages/d/page_text/page-00001.txt"),
            "text/plain; charset=utf-8"
        );
        assert_eq!(content_type_for("uploads/blob"), "application/octet-stream");
    }
}
