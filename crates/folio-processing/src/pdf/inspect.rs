use lopdf::Document;

use super::PdfError;

/// PDF readers accept the header anywhere in the first kilobyte.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Whether `data` carries a `%PDF-` header.
pub fn looks_like_pdf(data: &[u8]) -> bool {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

pub(super) fn load(data: &[u8]) -> Result<Document, PdfError> {
    if data.is_empty() {
        return Err(PdfError::Empty);
    }
    if !looks_like_pdf(data) {
        return Err(PdfError::NotPdf);
    }
    Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))
}

/// Count the pages of a PDF held in memory.
pub fn count_pages(data: &[u8]) -> Result<u32, PdfError> {
    let doc = load(data)?;
    let page_count = doc.get_pages().len() as u32;
    if page_count == 0 {
        return Err(PdfError::NoPages);
    }
    tracing::debug!(page_count, size_bytes = data.len(), "Counted PDF pages");
    Ok(page_count)
}
