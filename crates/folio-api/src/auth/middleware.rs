use crate::auth::jwt::JwtService;
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use folio_core::AppError;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtService,
}

impl AuthState {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            jwt: JwtService::new(jwt_secret),
        }
    }
}

/// Require `Authorization: Bearer <jwt>` and insert the caller's
/// [`TenantContext`](crate::auth::TenantContext) into request extensions.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => {
            return HttpAppError(AppError::Unauthorized(
                "Missing authorization header".to_string(),
            ))
            .into_response();
        }
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return HttpAppError(AppError::Unauthorized(
            "Invalid authorization header format".to_string(),
        ))
        .into_response();
    };

    match auth_state.jwt.validate(token.trim()) {
        Ok(tenant_context) => {
            tracing::Span::current().record("tenant_id", tenant_context.tenant_id.to_string());
            tracing::debug!(
                tenant_id = %tenant_context.tenant_id,
                user_id = %tenant_context.user_id,
                role = %tenant_context.role,
                "Request authenticated"
            );
            request.extensions_mut().insert(tenant_context);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}
