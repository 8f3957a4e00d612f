//! Web-tier session layer.
//!
//! The web tier never checks passwords itself: it forwards credentials to the
//! backend login endpoint and, on success, signs its own session token that
//! carries the backend's access/refresh pair as an opaque inner credential.
//!
//! The two layers have independent clocks. The outer session may outlive
//! the inner access token; when that happens the caller must sign in again,
//! since the web tier does not exchange refresh tokens on its own.

pub mod client;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::service::AuthResponse;
use crate::config::WebSessionConfig;
use crate::models::user::{PublicUser, SubscriptionStatus};

pub use client::{BackendClient, BackendError, Resume};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session invalid")]
    Invalid,

    #[error("session expired")]
    Expired,

    /// The outer session is alive but the backend credential inside it is
    /// not; only a fresh sign-in recovers.
    #[error("backend credential expired; sign in again")]
    ReauthRequired,

    #[error("session signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub subscription_status: SubscriptionStatus,
}

/// Backend-issued credentials, carried untouched inside the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendCredentials {
    pub access_token: String,
    pub refresh_token: String,
    /// `exp` of the access token, read without verification; the web tier
    /// does not hold the backend secret.
    pub access_expires_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSession {
    pub user: SessionUser,
    pub backend: BackendCredentials,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct ExpiryOnly {
    exp: i64,
}

/// Reads `exp` from a JWT payload without checking its signature.
fn peek_expiry(token: &str) -> Option<i64> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    decode::<ExpiryOnly>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims.exp)
}

pub struct SessionAdapter {
    backend: BackendClient,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    max_age: Duration,
}

impl SessionAdapter {
    pub fn new(config: &WebSessionConfig) -> Self {
        Self::with_backend(BackendClient::new(config.api_url.clone()), config)
    }

    pub fn with_backend(backend: BackendClient, config: &WebSessionConfig) -> Self {
        let secret = config.session_secret.expose().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        Self {
            backend,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            max_age: config.session_max_age,
        }
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    /// Delegates the credential check to the backend. Any failure yields
    /// `None`; which step failed is logged, never returned.
    pub async fn authorize(&self, email: &str, password: &str) -> Option<String> {
        if email.trim().is_empty() || password.is_empty() {
            return None;
        }

        let login = match self.backend.login(email, password).await {
            Ok(login) => login,
            Err(e) => {
                warn!("Session sign-in rejected: {e}");
                return None;
            }
        };

        match self.mint(login) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Session could not be minted: {e}");
                None
            }
        }
    }

    pub fn mint(&self, login: AuthResponse) -> Result<String, SessionError> {
        self.mint_at(login, Utc::now())
    }

    fn mint_at(&self, login: AuthResponse, now: DateTime<Utc>) -> Result<String, SessionError> {
        let AuthResponse { user, tokens } = login;
        let session = WebSession {
            user: SessionUser {
                id: user.id,
                email: user.email,
                name: user.name,
                subscription_status: user.subscription_status,
            },
            backend: BackendCredentials {
                access_expires_at: peek_expiry(&tokens.access_token),
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            iat: now.timestamp(),
            exp: (now + self.max_age).timestamp(),
        };
        info!(user_id = %session.user.id, "Web session created");
        self.sign(&session)
    }

    fn sign(&self, session: &WebSession) -> Result<String, SessionError> {
        encode(&Header::new(Algorithm::HS256), session, &self.encoding)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }

    /// Verifies the outer session only. The inner credential is not checked.
    pub fn open(&self, token: &str) -> Result<WebSession, SessionError> {
        decode::<WebSession>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            })
    }

    /// Unwraps the session into the bearer credential for backend calls.
    pub fn bearer(&self, token: &str) -> Result<String, SessionError> {
        self.bearer_at(token, Utc::now())
    }

    fn bearer_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, SessionError> {
        let session = self.open(token)?;
        match session.backend.access_expires_at {
            Some(exp) if exp <= now.timestamp() => Err(SessionError::ReauthRequired),
            _ => Ok(session.backend.access_token),
        }
    }

    /// Extends the outer session. The inner credential is carried over as is,
    /// so this never revives an expired backend token.
    pub fn refresh(&self, token: &str) -> Result<String, SessionError> {
        self.refresh_at(token, Utc::now())
    }

    fn refresh_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, SessionError> {
        let mut session = self.open(token)?;
        session.iat = now.timestamp();
        session.exp = (now + self.max_age).timestamp();
        self.sign(&session)
    }

    /// Fetches the live profile through the backend using the session's bearer.
    pub async fn current_user(&self, token: &str) -> Result<PublicUser, SessionError> {
        let bearer = self.bearer(token)?;
        self.backend.me(&bearer).await.map_err(|e| {
            if e.is_unauthorized() {
                SessionError::ReauthRequired
            } else {
                SessionError::Backend(e)
            }
        })
    }
}
