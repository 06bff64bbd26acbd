use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::models::{Role, User};
use crate::utils::error::AppError;

pub const ACCESS_TOKEN_TTL_HOURS: i64 = 6;
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    PasswordReset,
}

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String, // user _id (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Only present for moderators and admins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub kind: TokenKind,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
    pub aud: String,
    pub iss: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<ObjectId, AppError> {
        ObjectId::parse_str(&self.sub).map_err(|_| AppError::auth(INVALID_TOKEN_MESSAGE))
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        self.role.map_or(false, |r| roles.contains(&r))
    }
}

/// Issues and verifies HS256 tokens for one secret/issuer/audience triple.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl TokenSigner {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
        }
    }

    fn base_claims(&self, sub: String, kind: TokenKind, ttl: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            sub,
            email: None,
            first_name: None,
            last_name: None,
            role: None,
            kind,
            iat: now.timestamp() as usize,
            exp: (now + ttl).timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Session token; the role claim is only set for privileged users.
    pub fn issue_access(&self, user: &User) -> Result<String, AppError> {
        let mut claims = self.base_claims(
            user.id_hex(),
            TokenKind::Access,
            Duration::hours(ACCESS_TOKEN_TTL_HOURS),
        );
        claims.email = Some(user.email.clone());
        claims.first_name = Some(user.first_name.clone());
        claims.last_name = Some(user.last_name.clone());
        claims.role = user.role.is_privileged().then_some(user.role);
        self.sign(&claims)
    }

    pub fn issue_reset(&self, user_id: &ObjectId) -> Result<String, AppError> {
        let claims = self.base_claims(
            user_id.to_hex(),
            TokenKind::PasswordReset,
            Duration::hours(RESET_TOKEN_TTL_HOURS),
        );
        self.sign(&claims)
    }

    /// Checks signature, expiry, issuer, audience and token kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("Token rejected: {}", e);
                AppError::auth(INVALID_TOKEN_MESSAGE)
            })?;

        if claims.kind != expected {
            return Err(AppError::auth(INVALID_TOKEN_MESSAGE));
        }

        Ok(claims)
    }
}

/// Digest stored in `passwordResetTokens`; the raw token never hits the store.
pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
pub fn test_signer() -> TokenSigner {
    TokenSigner::new(&JwtSettings {
        secret: "test-secret".into(),
        issuer: "member-portal".into(),
        audience: "member-portal-web".into(),
    })
}
