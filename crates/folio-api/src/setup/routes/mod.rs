//! Route configuration and setup.
//!
//! Page routes live in [domains](domains); health checks in [health](health).
//! `/files` is public: its links carry their own signature.

mod domains;
mod health;

use crate::auth::{auth_middleware, AuthState};
use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use folio_core::Config;
use folio_infra::request_id_middleware;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the router from configuration.
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router<()> {
    tracing::info!(
        http_concurrency_limit = config.http_concurrency_limit(),
        "HTTP concurrency limit layer enabled"
    );
    build_router(state, config.http_concurrency_limit())
}

/// Assemble public and authenticated routes around `state`.
///
/// CORS origins and the JWT secret come from `state.security`.
pub fn build_router(state: Arc<AppState>, http_concurrency_limit: usize) -> Router<()> {
    let cors = setup_cors(&state.security.cors_origins);
    let auth_state = Arc::new(AuthState::new(&state.security.jwt_secret));

    let protected_routes = domains::pdf_routes().layer(axum::middleware::from_fn_with_state(
        auth_state,
        auth_middleware,
    ));

    public_routes()
        .merge(protected_routes)
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit.max(1)))
        .layer(cors)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .with_state(state)
}

/// Request span with empty slots the request id and auth middleware fill in.
fn make_request_span(request: &Request) -> tracing::Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str())
        .unwrap_or_else(|| request.uri().path());

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        route = %route,
        request_id = tracing::field::Empty,
        tenant_id = tracing::field::Empty,
    )
}

fn setup_cors(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(Any)
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .route("/ready", get(health::readiness_check))
        .route(
            "/files/{*key}",
            get(crate::handlers::signed_file::get_signed_file),
        )
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
}
