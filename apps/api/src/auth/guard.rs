use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, field::display, Span};
use uuid::Uuid;

use crate::auth::tokens::{TokenClaims, TokenError, TokenIssuer, TokenKind};
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;
use crate::store::UserStore;

/// Per-request identity, built from a verified token plus a fresh store
/// lookup. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        AuthUser {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(msg) => AppError::Internal(anyhow::anyhow!(msg)),
            TokenError::Expired | TokenError::Invalid(_) => AppError::InvalidToken,
        }
    }
}

fn bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::NotAuthenticated)
}

/// Loads the token's subject and checks it is still live: the user exists
/// and the token was issued at the user's current `token_version`.
pub async fn resolve_subject(users: &dyn UserStore, claims: &TokenClaims) -> Result<User, AppError> {
    let user = users
        .find_by_id(claims.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    if user.token_version != claims.ver {
        debug!(user_id = %user.id, "rejecting token from a revoked generation");
        return Err(AppError::InvalidToken);
    }
    Ok(user)
}

/// Verifies an `Authorization` header value. Signature and expiry are
/// checked before the store is touched.
pub async fn authenticate(
    users: &dyn UserStore,
    tokens: &TokenIssuer,
    authorization: Option<&str>,
) -> Result<AuthUser, AppError> {
    let token = bearer_token(authorization)?;
    let claims = tokens.verify(token, TokenKind::Access)?;
    let user = resolve_subject(users, &claims).await?;
    Ok(AuthUser::from(&user))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let user = authenticate(state.users.as_ref(), &state.tokens, header).await?;
        Span::current().record("user_id", display(user.id));
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::Identity;
    use crate::config::{JwtConfig, Secret};
    use crate::models::user::NewUser;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&JwtConfig {
            access_secret: Secret::new("guard-access"),
            access_ttl: Duration::hours(1),
            refresh_secret: Secret::new("guard-refresh"),
            refresh_ttl: Duration::days(1),
        })
    }

    async fn seeded() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .insert_user(NewUser {
                email: "grace@example.com".into(),
                password_hash: None,
                name: "Grace".into(),
            })
            .await
            .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let (store, user) = seeded().await;
        let tokens = issuer();
        let pair = tokens.issue(&Identity::from(&user)).unwrap();
        let header = format!("Bearer {}", pair.access_token);

        let ctx = authenticate(&store, &tokens, Some(&header)).await.unwrap();
        assert_eq!(ctx.id, user.id);
        assert_eq!(ctx.email, "grace@example.com");
    }

    #[tokio::test]
    async fn test_missing_or_non_bearer_header() {
        let (store, _) = seeded().await;
        let tokens = issuer();
        for header in [None, Some("Basic abc"), Some("Bearer "), Some("bearer abc")] {
            let err = authenticate(&store, &tokens, header).await.unwrap_err();
            assert!(matches!(err, AppError::NotAuthenticated), "{header:?}");
        }
    }

    #[tokio::test]
    async fn test_deleted_user_rejected_despite_valid_signature() {
        let (store, user) = seeded().await;
        let tokens = issuer();
        let pair = tokens.issue(&Identity::from(&user)).unwrap();
        assert!(tokens.verify(&pair.access_token, TokenKind::Access).is_ok());

        store.remove_user(user.id).await;
        let header = format!("Bearer {}", pair.access_token);
        let err = authenticate(&store, &tokens, Some(&header)).await.unwrap_err();
        assert!(matches!(err, AppError::UserNotFound));
    }

    #[tokio::test]
    async fn test_forged_token_never_reaches_store() {
        let (store, user) = seeded().await;
        let tokens = issuer();
        let pair = tokens.issue(&Identity::from(&user)).unwrap();
        // An unavailable store would turn any lookup into a 500.
        store.set_unavailable(true);

        let header = format!("Bearer {}x", pair.access_token);
        let err = authenticate(&store, &tokens, Some(&header)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));

        let expired = tokens
            .issue_at(&Identity::from(&user), Utc::now() - Duration::hours(2))
            .unwrap();
        let header = format!("Bearer {}", expired.access_token);
        let err = authenticate(&store, &tokens, Some(&header)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[tokio::test]
    async fn test_revoked_generation_rejected() {
        let (store, user) = seeded().await;
        let tokens = issuer();
        let pair = tokens.issue(&Identity::from(&user)).unwrap();
        store.bump_token_version(user.id).await.unwrap();

        let header = format!("Bearer {}", pair.access_token);
        let err = authenticate(&store, &tokens, Some(&header)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }
}
