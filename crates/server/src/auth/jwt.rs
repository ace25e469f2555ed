use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared_types::{AppError, Role};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Token type discriminator. Only access tokens are issued.
const TOKEN_TYPE_ACCESS: &str = "access";

/// Seven days.
const DEFAULT_EXPIRY_MINUTES: i64 = 7 * 24 * 60;

/// JWT claims stored in access tokens.
///
/// The role claim is informational only; every capability decision reloads
/// the identity from the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    /// Unique token identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default)]
    pub typ: String,
}

/// Signing key and lifetime, resolved once at startup.
#[derive(Clone)]
pub struct JwtConfig {
    secret: Arc<str>,
    expiry_minutes: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("expiry_minutes", &self.expiry_minutes)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, expiry_minutes: i64) -> Self {
        Self {
            secret: Arc::from(secret.into()),
            expiry_minutes,
        }
    }

    /// `JWT_SECRET` (required) and `JWT_ACCESS_TOKEN_EXPIRY_MINUTES`.
    pub fn from_env() -> Result<Self, String> {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "JWT_SECRET must be set".to_string())?;
        let expiry_minutes = std::env::var("JWT_ACCESS_TOKEN_EXPIRY_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_EXPIRY_MINUTES);
        Ok(Self::new(secret, expiry_minutes))
    }

    pub fn expiry_minutes(&self) -> i64 {
        self.expiry_minutes
    }

    pub fn create_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.expiry_minutes)).timestamp(),
            jti: Some(Uuid::new_v4().to_string()),
            typ: TOKEN_TYPE_ACCESS.to_string(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to sign access token");
            AppError::internal("Failed to issue credential")
        })
    }

    /// Validate signature, expiry and token type.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        if token_data.claims.typ != TOKEN_TYPE_ACCESS {
            return Err(jsonwebtoken::errors::ErrorKind::InvalidToken.into());
        }
        Ok(token_data.claims)
    }
}
