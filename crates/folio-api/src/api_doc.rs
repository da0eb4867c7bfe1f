//! OpenAPI documentation.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use folio_core::models;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Folio API",
        version = "0.1.0",
        description = "Per-page access to PDF assets. Pages are rendered on demand in the background; clients poll until the page is ready."
    ),
    paths(
        handlers::pdf_page::get_pdf_page,
        handlers::pdf_extract::extract_all_pages,
        handlers::batch_status::get_batch_progress,
        handlers::signed_file::get_signed_file,
    ),
    components(
        schemas(
            handlers::pdf_page::PdfPageResponse,
            handlers::pdf_extract::ExtractAllResponse,
            handlers::RejectionResponse,
            models::ArtifactKind,
            models::BatchProgress,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "pdf-pages", description = "Render-or-serve access to individual PDF pages")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
