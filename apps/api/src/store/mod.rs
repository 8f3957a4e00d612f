//! Credential and resume persistence.
//!
//! Handlers only see the `UserStore` / `ResumeStore` traits. `AppState`
//! carries them as `Arc<dyn …>`: `PgStore` in production, `MemoryStore` in
//! tests and local runs without a database.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::resume::{NewResume, ResumeRow};
use crate::models::user::{NewUser, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Inserts a user. Must fail with `StoreError::Duplicate` when the email
    /// is already taken, even if a prior existence check passed.
    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Increments the user's token version, invalidating every token issued
    /// before the call. Returns the new version, or `None` for an unknown id.
    async fn bump_token_version(&self, id: Uuid) -> Result<Option<i32>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Every method is scoped by owner: rows belonging to someone else behave
/// exactly like rows that do not exist.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn list_resumes(&self, owner: Uuid) -> Result<Vec<ResumeRow>, StoreError>;

    async fn find_resume(&self, id: Uuid, owner: Uuid) -> Result<Option<ResumeRow>, StoreError>;

    async fn insert_resume(&self, new_resume: NewResume) -> Result<ResumeRow, StoreError>;

    /// Returns `false` when nothing owned by `owner` matched.
    async fn delete_resume(&self, id: Uuid, owner: Uuid) -> Result<bool, StoreError>;
}
