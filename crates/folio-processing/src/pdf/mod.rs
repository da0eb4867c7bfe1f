//! PDF page counting and single-page artifact extraction

mod extract;
#[cfg(any(test, feature = "test-util"))]
pub mod fixtures;
mod inspect;

pub use extract::{extract_page_pdf, extract_page_text};
pub use inspect::{count_pages, looks_like_pdf};

use folio_core::models::ArtifactKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF data is empty")]
    Empty,

    #[error("Data is not a PDF")]
    NotPdf,

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("PDF has no pages")]
    NoPages,

    #[error("Page {page} is outside 1..={page_count}")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("Failed to write PDF: {0}")]
    Write(String),

    #[error("PDF worker failed: {0}")]
    Join(String),
}

impl PdfError {
    /// Whether retrying with the same input could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PdfError::Join(_))
    }
}

/// Count pages on the blocking pool.
pub async fn probe_page_count(data: Vec<u8>) -> Result<u32, PdfError> {
    tokio::task::spawn_blocking(move || count_pages(&data))
        .await
        .map_err(|e| PdfError::Join(e.to_string()))?
}

/// Produce the bytes of one page artifact on the blocking pool.
pub async fn render_page_artifact(
    data: Vec<u8>,
    page: u32,
    kind: ArtifactKind,
) -> Result<Vec<u8>, PdfError> {
    tokio::task::spawn_blocking(move || match kind {
        ArtifactKind::PdfPage => extract_page_pdf(&data, page),
        ArtifactKind::PageText => extract_page_text(&data, page).map(String::into_bytes),
    })
    .await
    .map_err(|e| PdfError::Join(e.to_string()))?
}
