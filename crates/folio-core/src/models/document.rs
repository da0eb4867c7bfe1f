use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Content types some uploaders send for PDFs when they do not sniff the file.
const GENERIC_CONTENT_TYPES: &[&str] = &["application/octet-stream", "binary/octet-stream", ""];

/// Tenant and brand the caller is acting for.
///
/// Passed explicitly into every repository and coordinator call; nothing in
/// the crate looks the active tenant up from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetScope {
    pub tenant_id: Uuid,
    pub brand_id: Option<Uuid>,
}

impl AssetScope {
    pub fn new(tenant_id: Uuid, brand_id: Option<Uuid>) -> Self {
        Self {
            tenant_id,
            brand_id,
        }
    }

    pub fn tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            brand_id: None,
        }
    }

    /// A brand-scoped caller only sees that brand's assets; a tenant-wide
    /// caller sees all of them.
    pub fn allows(&self, document: &Document) -> bool {
        document.tenant_id == self.tenant_id
            && self
                .brand_id
                .map_or(true, |brand| document.brand_id == Some(brand))
    }
}

/// A PDF-bearing asset.
///
/// `page_count` is discovered lazily and never rewritten once set.
/// `pdf_unsupported_large` only ever transitions from false to true.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub brand_id: Option<Uuid>,
    pub original_filename: String,
    pub storage_key: String,
    pub content_type: String,
    pub file_size: i64,
    pub page_count: Option<i32>,
    pub pdf_unsupported_large: bool,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_pdf(&self) -> bool {
        let content_type = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if content_type == PDF_CONTENT_TYPE {
            return true;
        }

        GENERIC_CONTENT_TYPES.contains(&content_type.as_str())
            && self.original_filename.to_ascii_lowercase().ends_with(".pdf")
    }

    /// Cached page count, ignoring nonsensical stored values.
    pub fn known_page_count(&self) -> Option<u32> {
        self.page_count
            .and_then(|count| u32::try_from(count).ok())
            .filter(|count| *count > 0)
    }
}
