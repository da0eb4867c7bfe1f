use lopdf::content::Content;
use lopdf::{Document, Object};

use super::inspect::load;
use super::PdfError;

/// Page object ids keyed by 1-based page number, checked against `page`.
fn checked_pages(
    doc: &Document,
    page: u32,
) -> Result<std::collections::BTreeMap<u32, lopdf::ObjectId>, PdfError> {
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    if page_count == 0 {
        return Err(PdfError::NoPages);
    }
    if page == 0 || page > page_count {
        return Err(PdfError::PageOutOfRange { page, page_count });
    }
    Ok(pages)
}

/// Build a standalone single-page PDF from page `page` (1-based).
pub fn extract_page_pdf(data: &[u8], page: u32) -> Result<Vec<u8>, PdfError> {
    let mut doc = load(data)?;
    let pages = checked_pages(&doc, page)?;

    let others: Vec<u32> = pages.keys().copied().filter(|n| *n != page).collect();
    if !others.is_empty() {
        doc.delete_pages(&others);
    }
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| PdfError::Write(e.to_string()))?;

    tracing::debug!(page, size_bytes = out.len(), "Extracted single-page PDF");
    Ok(out)
}

/// Extract the text of page `page` (1-based).
///
/// Uses lopdf's font-aware extraction and falls back to collecting raw
/// text-showing operands when the page's fonts cannot be decoded. A page
/// without text yields an empty string.
pub fn extract_page_text(data: &[u8], page: u32) -> Result<String, PdfError> {
    let doc = load(data)?;
    let pages = checked_pages(&doc, page)?;

    match doc.extract_text(&[page]) {
        Ok(text) => Ok(normalize(&text)),
        Err(e) => {
            tracing::warn!(page, error = %e, "Font-aware text extraction failed, using raw operands");
            let page_id = pages[&page];
            let content = doc
                .get_and_decode_page_content(page_id)
                .map_err(|e| PdfError::Parse(e.to_string()))?;
            Ok(normalize(&raw_text(&content)))
        }
    }
}

fn raw_text(content: &Content) -> String {
    let mut text = String::new();
    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tj" | "'" | "\"" => {
                if let Some(Object::String(bytes, _)) = operation.operands.last() {
                    text.push_str(&String::from_utf8_lossy(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operation.operands.first() {
                    for item in items {
                        if let Object::String(bytes, _) = item {
                            text.push_str(&String::from_utf8_lossy(bytes));
                        }
                    }
                }
            }
            "ET" | "T*" | "Td" | "TD" => text.push('\n'),
            _ => {}
        }
    }
    text
}

/// Trim trailing whitespace per line and collapse runs of blank lines.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
