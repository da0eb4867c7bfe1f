use crate::error::ErrorResponse;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use folio_core::models::AssetScope;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// User role for authorization
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Member,
    Viewer,
}

impl UserRole {
    /// Tenant administrators may trigger bulk work such as extract-all.
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Member => write!(f, "member"),
            UserRole::Viewer => write!(f, "viewer"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "member" => Ok(UserRole::Member),
            "viewer" => Ok(UserRole::Viewer),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Uuid, // user_id
    pub tenant_id: Uuid,
    /// Present when the user acts for a single brand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<Uuid>,
    pub role: String, // "admin", "member", or "viewer"
    pub exp: i64,
    pub iat: i64,
}

/// Caller identity extracted from the JWT and stored in request extensions
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub brand_id: Option<Uuid>,
    pub user_id: Uuid,
    pub role: UserRole,
}

impl TenantContext {
    pub fn scope(&self) -> AssetScope {
        AssetScope::new(self.tenant_id, self.brand_id)
    }
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse {
                        error: "Missing tenant context".to_string(),
                        details: None,
                        error_type: None,
                        code: "MISSING_TENANT_CONTEXT".to_string(),
                        recoverable: false,
                        suggested_action: Some("Check authentication token".to_string()),
                    }),
                )
            })
    }
}
