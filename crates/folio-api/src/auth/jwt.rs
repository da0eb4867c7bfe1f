//! HS256 JWT validation

use crate::auth::models::{JwtClaims, TenantContext, UserRole};
use chrono::Utc;
use folio_core::AppError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.required_spec_claims = ["exp", "sub"].iter().map(|s| s.to_string()).collect();

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate a bearer token and build the caller's context.
    pub fn validate(&self, token: &str) -> Result<TenantContext, AppError> {
        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "JWT validation failed");
                AppError::Unauthorized("Invalid or expired token".to_string())
            })?;

        let claims = token_data.claims;
        let role = claims
            .role
            .parse::<UserRole>()
            .map_err(|_| AppError::Unauthorized("Invalid role in token".to_string()))?;

        Ok(TenantContext {
            tenant_id: claims.tenant_id,
            brand_id: claims.brand_id,
            user_id: claims.sub,
            role,
        })
    }

    /// Issue a token. Used by tooling and tests; the surrounding product
    /// issues tokens for real users.
    pub fn issue(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        brand_id: Option<Uuid>,
        role: UserRole,
        ttl_seconds: i64,
    ) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            sub: user_id,
            tenant_id,
            brand_id,
            role: role.to_string(),
            exp: now + ttl_seconds,
            iat: now,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_issued_token_validates() {
        let service = JwtService::new(SECRET);
        let tenant = Uuid::new_v4();
        let brand = Uuid::new_v4();
        let token = service
            .issue(Uuid::new_v4(), tenant, Some(brand), UserRole::Admin, 60)
            .unwrap();

        let ctx = service.validate(&token).unwrap();
        assert_eq!(ctx.tenant_id, tenant);
        assert_eq!(ctx.brand_id, Some(brand));
        assert_eq!(ctx.role, UserRole::Admin);
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = JwtService::new(SECRET);
        let token = service
            .issue(Uuid::new_v4(), Uuid::new_v4(), None, UserRole::Member, -120)
            .unwrap();
        assert!(matches!(
            service.validate(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtService::new(SECRET)
            .issue(Uuid::new_v4(), Uuid::new_v4(), None, UserRole::Member, 60)
            .unwrap();
        let other = JwtService::new("fedcba9876543210fedcba9876543210");
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let service = JwtService::new(SECRET);
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            sub: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            brand_id: None,
            role: "superuser".to_string(),
            exp: now + 60,
            iat: now,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(service.validate(&token).is_err());
    }
}
