use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kinds of per-page artifact the render worker can produce.
///
/// Every kind has a fixed content type and storage path convention; adding a
/// kind means adding a variant here and a producer in the render handler.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The page extracted into a standalone single-page PDF.
    #[default]
    PdfPage,
    /// Plain text extracted from the page.
    PageText,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::PdfPage, ArtifactKind::PageText];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::PdfPage => "pdf_page",
            ArtifactKind::PageText => "page_text",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::PdfPage => "application/pdf",
            ArtifactKind::PageText => "text/plain; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::PdfPage => "pdf",
            ArtifactKind::PageText => "txt",
        }
    }

    /// Storage key of the artifact for one page. Pages are 1-based.
    ///
    /// Layout: `tenants/{tenant}/pdf-pages/{document}/{kind}/page-{n:05}.{ext}`
    pub fn storage_key(&self, tenant_id: Uuid, document_id: Uuid, page: u32) -> String {
        format!(
            "tenants/{}/pdf-pages/{}/{}/page-{:05}.{}",
            tenant_id,
            document_id,
            self.as_str(),
            page,
            self.extension()
        )
    }

    /// Key of the short-lived dispatch lock guarding one page render.
    pub fn dispatch_lock_key(&self, document_id: Uuid, page: u32) -> String {
        format!("pdf-render:{}:{}:{}", document_id, self.as_str(), page)
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf_page" => Ok(ArtifactKind::PdfPage),
            "page_text" => Ok(ArtifactKind::PageText),
            _ => Err(anyhow::anyhow!("Invalid artifact kind: {}", s)),
        }
    }
}

/// One rendered page as stored in object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageArtifact {
    pub document_id: Uuid,
    pub page: u32,
    pub kind: ArtifactKind,
    pub storage_key: String,
}

impl PageArtifact {
    pub fn new(tenant_id: Uuid, document_id: Uuid, page: u32, kind: ArtifactKind) -> Self {
        Self {
            document_id,
            page,
            kind,
            storage_key: kind.storage_key(tenant_id, document_id, page),
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_layout() {
        let tenant = Uuid::nil();
        let doc = Uuid::from_u128(0xfeed);
        let key = ArtifactKind::PdfPage.storage_key(tenant, doc, 7);
        assert_eq!(
            key,
            format!("tenants/{}/pdf-pages/{}/pdf_page/page-00007.pdf", tenant, doc)
        );
        assert!(ArtifactKind::PageText
            .storage_key(tenant, doc, 123)
            .ends_with("/page_text/page-00123.txt"));
    }

    #[test]
    fn test_lock_keys_differ_per_kind_and_page() {
        let doc = Uuid::new_v4();
        let a = ArtifactKind::PdfPage.dispatch_lock_key(doc, 1);
        let b = ArtifactKind::PageText.dispatch_lock_key(doc, 1);
        let c = ArtifactKind::PdfPage.dispatch_lock_key(doc, 2);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("pdf-render:"));
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in ArtifactKind::ALL {
            assert_eq!(kind.as_str().parse::<ArtifactKind>().unwrap(), kind);
        }
        assert!("thumbnail".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn test_kind_serde_matches_query_values() {
        let kind: ArtifactKind = serde_json::from_str("\"page_text\"").unwrap();
        assert_eq!(kind, ArtifactKind::PageText);
        assert_eq!(ArtifactKind::default(), ArtifactKind::PdfPage);
    }

    #[test]
    fn test_page_artifact_uses_kind_content_type() {
        let artifact = PageArtifact::new(Uuid::new_v4(), Uuid::new_v4(), 3, ArtifactKind::PageText);
        assert_eq!(artifact.content_type(), "text/plain; charset=utf-8");
        assert!(artifact.storage_key.ends_with("page-00003.txt"));
    }
}
