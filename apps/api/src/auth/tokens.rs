//! Access/refresh token issuance and verification (HS256 JWT).
//!
//! Tokens are stateless: nothing is recorded at issuance. The only way to
//! invalidate one early is the `ver` claim, compared by the auth guard
//! against the user's current `token_version`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token invalid: {0}")]
    Invalid(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Identity fields embedded in both tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub ver: i32,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// The subset of a user that gets signed into a token.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub version: i32,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            version: user.token_version,
        }
    }
}

struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKey {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Issues and verifies the access/refresh pair. Each kind has its own
/// secret, so a refresh token never verifies as an access token.
pub struct TokenIssuer {
    access: SigningKey,
    refresh: SigningKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];
        validation.leeway = 0;
        validation.validate_aud = false;

        Self {
            access: SigningKey::new(config.access_secret.expose(), config.access_ttl),
            refresh: SigningKey::new(config.refresh_secret.expose(), config.refresh_ttl),
            validation,
        }
    }

    fn key(&self, kind: TokenKind) -> &SigningKey {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    /// Same inputs and instant always produce the same pair.
    pub fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(identity, TokenKind::Access, now)?,
            refresh_token: self.sign(identity, TokenKind::Refresh, now)?,
        })
    }

    fn sign(&self, identity: &Identity, kind: TokenKind, now: DateTime<Utc>) -> Result<String, TokenError> {
        let key = self.key(kind);
        let claims = TokenClaims {
            user_id: identity.user_id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            ver: identity.version,
            iat: now.timestamp(),
            exp: (now + key.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Checks signature and expiry only. Whether the subject still exists is
    /// the guard's job.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &self.key(kind).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
