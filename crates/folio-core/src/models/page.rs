use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Why a page request was turned down. Each variant is a terminal outcome
/// reached before any side effect other than page-count discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    InvalidPage,
    NotPdf,
    PageCountUnavailable,
    UnsupportedLarge { page_count: u32 },
    PageExceedsCount { page: i64, page_count: u32 },
}

impl RejectReason {
    pub fn message(&self) -> String {
        match self {
            RejectReason::InvalidPage => "Page must be >= 1".to_string(),
            RejectReason::NotPdf => "Asset is not a PDF".to_string(),
            RejectReason::PageCountUnavailable => "PDF page count unavailable".to_string(),
            RejectReason::UnsupportedLarge { page_count } => format!(
                "PDF has {} pages and is too large for page rendering",
                page_count
            ),
            RejectReason::PageExceedsCount { page, page_count } => format!(
                "Requested page {} exceeds PDF page count {}",
                page, page_count
            ),
        }
    }

    /// Page count echoed back to the client, when the rejection carries one.
    pub fn page_count(&self) -> Option<u32> {
        match self {
            RejectReason::UnsupportedLarge { page_count }
            | RejectReason::PageExceedsCount { page_count, .. } => Some(*page_count),
            _ => None,
        }
    }

    /// Machine-readable status, only set for rejections clients branch on.
    pub fn status(&self) -> Option<&'static str> {
        match self {
            RejectReason::UnsupportedLarge { .. } => Some("unsupported_large"),
            _ => None,
        }
    }
}

/// Result of resolving one (document, page) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The artifact exists; `url` is a time-limited link to it.
    Ready {
        url: String,
        page: u32,
        page_count: u32,
    },
    /// A render is in flight or was just requested. Poll again.
    Processing { page: u32, page_count: u32 },
    Rejected(RejectReason),
}

impl PageOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, PageOutcome::Rejected(_))
    }
}

/// Handle returned when a full-document extraction was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RenderBatchHandle {
    pub batch_id: Uuid,
    pub total_jobs: u32,
    pub pending_jobs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Started(RenderBatchHandle),
    /// The document failed the same validation as single-page requests.
    Rejected(RejectReason),
    /// The job runtime refused the batch.
    RuntimeRejected(String),
}
