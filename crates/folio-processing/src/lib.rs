//! Folio Processing Library
//!
//! PDF inspection and per-page artifact production. All parsing is CPU-bound
//! and synchronous; the async entry points in [`pdf`] move it onto the
//! blocking thread pool.

pub mod pdf;

pub use pdf::{
    count_pages, extract_page_pdf, extract_page_text, probe_page_count, render_page_artifact,
    PdfError,
};
