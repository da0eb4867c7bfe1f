pub mod batch_status;
pub mod pdf_extract;
pub mod pdf_page;
pub mod signed_file;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use folio_core::models::{ArtifactKind, AssetScope, Document, RejectReason};
use folio_core::AppError;
use folio_db::DocumentStore;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::HttpAppError;

/// Optional artifact kind selector shared by the page endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct KindQuery {
    /// `pdf_page` (default) or `page_text`
    pub kind: Option<ArtifactKind>,
}

impl KindQuery {
    pub fn kind(&self) -> ArtifactKind {
        self.kind.unwrap_or_default()
    }
}

/// 422 body for a validation rejection.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RejectionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
}

impl From<&RejectReason> for RejectionResponse {
    fn from(reason: &RejectReason) -> Self {
        Self {
            status: reason.status().map(String::from),
            message: reason.message(),
            page_count: reason.page_count(),
        }
    }
}

pub(crate) fn unprocessable(body: RejectionResponse) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
}

pub(crate) fn rejection_response(reason: &RejectReason) -> Response {
    unprocessable(RejectionResponse::from(reason))
}

/// Load a document visible to `scope`, or 404.
pub(crate) async fn load_document(
    documents: &dyn DocumentStore,
    scope: AssetScope,
    document_id: Uuid,
) -> Result<Document, HttpAppError> {
    documents
        .get_document(scope, document_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()).into())
}
