use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::info;
use validator::Validate;

use crate::auth::guard::{resolve_subject, AuthUser};
use crate::auth::password::{hash_password, verify_password, PasswordError};
use crate::auth::tokens::{Identity, TokenIssuer, TokenKind, TokenPair};
use crate::errors::AppError;
use crate::models::user::{NewUser, PublicUser, User};
use crate::store::UserStore;
use crate::validation::normalize_email;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
}

impl RegisterRequest {
    fn normalized(self) -> Self {
        Self {
            email: normalize_email(&self.email),
            name: self.name.trim().to_string(),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: PublicUser,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: PublicUser,
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        AppError::Internal(e.into())
    }
}

// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_blocking(plain: String) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    Ok(hash)
}

// Stand-in for accounts that are missing or have no password.
static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

async fn dummy_hash() -> Result<&'static str, AppError> {
    let hash = DUMMY_HASH
        .get_or_try_init(|| hash_blocking("absent-account-placeholder".to_string()))
        .await?;
    Ok(hash.as_str())
}

async fn verify_blocking(plain: String, hash: String) -> Result<bool, AppError> {
    let matched = tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    Ok(matched)
}

fn session_for(tokens: &TokenIssuer, user: &User) -> Result<AuthResponse, AppError> {
    Ok(AuthResponse {
        user: PublicUser::from(user),
        tokens: tokens.issue(&Identity::from(user))?,
    })
}

/// Creates an account and returns its first token pair.
///
/// The existence check is a fast path only; two racing registrations can
/// both pass it, and the store's uniqueness constraint turns the loser
/// into the same `Conflict`.
pub async fn register(
    users: &dyn UserStore,
    tokens: &TokenIssuer,
    req: RegisterRequest,
) -> Result<AuthResponse, AppError> {
    let req = req.normalized();
    req.validate()?;
    let RegisterRequest {
        email,
        password,
        name,
    } = req;

    if users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let password_hash = hash_blocking(password).await?;
    let user = users
        .insert_user(NewUser {
            email,
            password_hash: Some(password_hash),
            name,
        })
        .await?;

    info!(user_id = %user.id, "User registered successfully");
    session_for(tokens, &user)
}

/// Exchanges credentials for a brand-new token pair. Unknown email,
/// password-less (social) accounts and wrong passwords are indistinguishable.
pub async fn login(
    users: &dyn UserStore,
    tokens: &TokenIssuer,
    req: LoginRequest,
) -> Result<AuthResponse, AppError> {
    let req = LoginRequest {
        email: normalize_email(&req.email),
        ..req
    };
    req.validate()?;

    let user = users.find_by_email(&req.email).await?;
    let Some((user, hash)) = user.and_then(|u| u.password_hash.clone().map(|h| (u, h))) else {
        verify_blocking(req.password, dummy_hash().await?.to_string()).await?;
        return Err(AppError::InvalidCredentials);
    };

    if !verify_blocking(req.password, hash).await? {
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = %user.id, "User logged in successfully");
    session_for(tokens, &user)
}

/// Current profile, read from the store rather than from token claims.
pub async fn me(users: &dyn UserStore, auth: Option<&AuthUser>) -> Result<MeResponse, AppError> {
    let auth = auth.ok_or(AppError::NotAuthenticated)?;
    let user = users
        .find_by_id(auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(MeResponse {
        user: PublicUser::from(&user),
    })
}

/// Mints a new pair from a refresh token whose generation is still current.
pub async fn refresh(
    users: &dyn UserStore,
    tokens: &TokenIssuer,
    req: RefreshRequest,
) -> Result<AuthResponse, AppError> {
    let req = RefreshRequest {
        refresh_token: req.refresh_token.trim().to_string(),
    };
    req.validate()?;

    let claims = tokens.verify(&req.refresh_token, TokenKind::Refresh)?;
    let user = resolve_subject(users, &claims).await?;

    info!(user_id = %user.id, "Token pair refreshed");
    session_for(tokens, &user)
}

/// Invalidates every outstanding token of the caller.
pub async fn logout(users: &dyn UserStore, auth: &AuthUser) -> Result<(), AppError> {
    users
        .bump_token_version(auth.id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    info!(user_id = %auth.id, "User logged out; outstanding tokens revoked");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JwtConfig, Secret};
    use crate::store::MemoryStore;
    use chrono::Duration;
    use std::sync::Arc;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&JwtConfig {
            access_secret: Secret::new("svc-access"),
            access_ttl: Duration::days(7),
            refresh_secret: Secret::new("svc-refresh"),
            refresh_ttl: Duration::days(30),
        })
    }

    fn register_req(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "hunter2hunter2".to_string(),
            name: "Ada Lovelace".to_string(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let tokens = issuer();

        let registered = register(&store, &tokens, register_req("ada@example.com"))
            .await
            .unwrap();
        assert_eq!(registered.user.email, "ada@example.com");
        assert_eq!(registered.user.name, "Ada Lovelace");

        let logged_in = login(&store, &tokens, login_req("ada@example.com", "hunter2hunter2"))
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
        assert_eq!(logged_in.user.name, "Ada Lovelace");

        let claims = tokens
            .verify(&logged_in.tokens.access_token, TokenKind::Access)
            .unwrap();
        assert_eq!(claims.user_id, registered.user.id);
    }

    #[tokio::test]
    async fn test_register_normalizes_email() {
        let store = MemoryStore::new();
        let tokens = issuer();
        register(&store, &tokens, register_req("  Ada@Example.com "))
            .await
            .unwrap();
        assert!(login(&store, &tokens, login_req("ada@example.com", "hunter2hunter2"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_register_validation() {
        let store = MemoryStore::new();
        let err = register(
            &store,
            &issuer(),
            RegisterRequest {
                email: "nope".into(),
                password: "short".into(),
                name: "".into(),
            },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Validation(fields) => assert_eq!(fields.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let store = MemoryStore::new();
        let tokens = issuer();
        register(&store, &tokens, register_req("dup@example.com"))
            .await
            .unwrap();
        let err = register(&store, &tokens, register_req("dup@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_racing_registrations_exactly_one_wins() {
        let store: Arc<dyn UserStore> = Arc::new(MemoryStore::new());
        let tokens = Arc::new(issuer());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            let tokens = tokens.clone();
            handles.push(tokio::spawn(async move {
                register(store.as_ref(), &tokens, register_req("race@example.com")).await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 3);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let store = MemoryStore::new();
        let tokens = issuer();
        register(&store, &tokens, register_req("real@example.com"))
            .await
            .unwrap();
        store
            .insert_user(NewUser {
                email: "social@example.com".into(),
                password_hash: None,
                name: "Social".into(),
            })
            .await
            .unwrap();

        let wrong_password = login(&store, &tokens, login_req("real@example.com", "wrong-password"))
            .await
            .unwrap_err();
        let no_such_email = login(&store, &tokens, login_req("ghost@example.com", "hunter2hunter2"))
            .await
            .unwrap_err();
        let social_only = login(&store, &tokens, login_req("social@example.com", "hunter2hunter2"))
            .await
            .unwrap_err();

        for err in [&wrong_password, &no_such_email, &social_only] {
            assert!(matches!(err, AppError::InvalidCredentials));
        }
        assert_eq!(wrong_password.to_string(), no_such_email.to_string());
    }

    #[tokio::test]
    async fn test_unknown_email_still_runs_argon2() {
        let store = MemoryStore::new();
        let err = login(&store, &issuer(), login_req("nobody@example.com", "hunter2hunter2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));

        let stand_in = DUMMY_HASH.get().expect("stand-in hash computed");
        assert!(stand_in.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
        assert!(!verify_password("hunter2hunter2", stand_in).unwrap());
    }

    #[tokio::test]
    async fn test_login_rejects_malformed_email_before_lookup() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = login(&store, &issuer(), login_req("ada@exa,mple.com", "hunter2hunter2"))
            .await
            .unwrap_err();
        match err {
            AppError::Validation(fields) => assert_eq!(fields[0].field, "email"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_corrupt_hash_is_internal_not_invalid_credentials() {
        let store = MemoryStore::new();
        let tokens = issuer();
        store
            .insert_user(NewUser {
                email: "corrupt@example.com".into(),
                password_hash: Some("garbage".into()),
                name: "Corrupt".into(),
            })
            .await
            .unwrap();
        let err = login(&store, &tokens, login_req("corrupt@example.com", "hunter2hunter2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_me_reflects_store_not_claims() {
        let store = MemoryStore::new();
        let tokens = issuer();
        let session = register(&store, &tokens, register_req("me@example.com"))
            .await
            .unwrap();
        let auth = AuthUser {
            id: session.user.id,
            email: session.user.email.clone(),
            name: session.user.name.clone(),
        };

        store
            .update_user(session.user.id, |u| u.name = "Renamed".to_string())
            .await;
        let profile = me(&store, Some(&auth)).await.unwrap();
        assert_eq!(profile.user.name, "Renamed");

        assert!(matches!(me(&store, None).await, Err(AppError::NotAuthenticated)));

        store.remove_user(session.user.id).await;
        assert!(matches!(me(&store, Some(&auth)).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_refresh_and_logout_revocation() {
        let store = MemoryStore::new();
        let tokens = issuer();
        let session = register(&store, &tokens, register_req("refresh@example.com"))
            .await
            .unwrap();

        let refreshed = refresh(
            &store,
            &tokens,
            RefreshRequest {
                refresh_token: session.tokens.refresh_token.clone(),
            },
        )
        .await
        .unwrap();
        assert_eq!(refreshed.user.id, session.user.id);

        // An access token is not accepted where a refresh token is expected.
        let err = refresh(
            &store,
            &tokens,
            RefreshRequest {
                refresh_token: session.tokens.access_token.clone(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));

        let auth = AuthUser {
            id: session.user.id,
            email: session.user.email.clone(),
            name: session.user.name.clone(),
        };
        logout(&store, &auth).await.unwrap();

        let err = refresh(
            &store,
            &tokens,
            RefreshRequest {
                refresh_token: refreshed.tokens.refresh_token,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }
}
