use async_trait::async_trait;
use folio_core::models::{AssetScope, Document};
use folio_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = r#"
    id,
    tenant_id,
    brand_id,
    original_filename,
    storage_key,
    content_type,
    file_size,
    page_count,
    pdf_unsupported_large,
    uploaded_at,
    updated_at
"#;

/// Document metadata as seen by the page coordinator.
///
/// Abstracts the database so the coordinator can be exercised against an
/// in-memory store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document visible to `scope`.
    async fn get_document(
        &self,
        scope: AssetScope,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError>;

    /// Store a discovered page count unless one is already recorded.
    ///
    /// Returns the count now stored, which is the existing one when another
    /// request got there first, or `None` when the document is gone.
    async fn record_page_count(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        page_count: u32,
    ) -> Result<Option<u32>, AppError>;

    /// Set `pdf_unsupported_large`. Returns whether the flag changed.
    async fn mark_unsupported_large(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a document row. Used by ingestion and tests.
    #[tracing::instrument(skip(self, original_filename, storage_key), fields(tenant_id = %tenant_id))]
    #[allow(clippy::too_many_arguments)]
    pub async fn create_document(
        &self,
        tenant_id: Uuid,
        brand_id: Option<Uuid>,
        original_filename: &str,
        storage_key: &str,
        content_type: &str,
        file_size: i64,
        page_count: Option<u32>,
    ) -> Result<Document, AppError> {
        let sql = format!(
            r#"
            INSERT INTO documents (
                tenant_id, brand_id, original_filename, storage_key,
                content_type, file_size, page_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        );

        let document = sqlx::query_as::<Postgres, Document>(&sql)
            .bind(tenant_id)
            .bind(brand_id)
            .bind(original_filename)
            .bind(storage_key)
            .bind(content_type)
            .bind(file_size)
            .bind(page_count.map(|count| count as i32))
            .fetch_one(&self.pool)
            .await?;

        tracing::info!(document_id = %document.id, "Document created");
        Ok(document)
    }
}

#[async_trait]
impl DocumentStore for DocumentRepository {
    #[tracing::instrument(skip(self), fields(tenant_id = %scope.tenant_id))]
    async fn get_document(
        &self,
        scope: AssetScope,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM documents
            WHERE tenant_id = $1
                AND id = $2
                AND ($3::uuid IS NULL OR brand_id = $3)
            "#,
            DOCUMENT_COLUMNS
        );

        let document = sqlx::query_as::<Postgres, Document>(&sql)
            .bind(scope.tenant_id)
            .bind(document_id)
            .bind(scope.brand_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(document)
    }

    #[tracing::instrument(skip(self))]
    async fn record_page_count(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        page_count: u32,
    ) -> Result<Option<u32>, AppError> {
        let page_count = i32::try_from(page_count)
            .map_err(|_| AppError::InvalidInput(format!("Page count {} out of range", page_count)))?;

        let written: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE documents
            SET page_count = $3,
                updated_at = NOW()
            WHERE tenant_id = $1
                AND id = $2
                AND page_count IS NULL
            RETURNING page_count
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .bind(page_count)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(count) = written {
            tracing::debug!(document_id = %document_id, page_count = count, "Page count recorded");
            return Ok(u32::try_from(count).ok());
        }

        // Already set by a concurrent request, or the document is gone
        let existing: Option<Option<i32>> = sqlx::query_scalar(
            "SELECT page_count FROM documents WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(existing
            .flatten()
            .and_then(|count| u32::try_from(count).ok()))
    }

    #[tracing::instrument(skip(self))]
    async fn mark_unsupported_large(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET pdf_unsupported_large = TRUE,
                updated_at = NOW()
            WHERE tenant_id = $1
                AND id = $2
                AND pdf_unsupported_large = FALSE
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .execute(&self.pool)
        .await?;

        let changed = result.rows_affected() > 0;
        if changed {
            tracing::info!(document_id = %document_id, "Document flagged as unsupported large PDF");
        }
        Ok(changed)
    }
}
