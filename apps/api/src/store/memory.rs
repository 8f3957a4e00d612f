use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::resume::{NewResume, ResumeRow};
use crate::models::user::{NewUser, SubscriptionStatus, User};
use crate::store::{ResumeStore, StoreError, UserStore};

/// In-process store with the same uniqueness and ownership rules as the
/// Postgres schema. Email uniqueness is checked under the write lock.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    resumes: RwLock<HashMap<Uuid, ResumeRow>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes a user and their resumes, as `ON DELETE CASCADE` would.
    pub async fn remove_user(&self, id: Uuid) -> bool {
        let removed = self.users.write().await.remove(&id).is_some();
        if removed {
            self.resumes.write().await.retain(|_, r| r.user_id != id);
        }
        removed
    }

    /// Applies an out-of-band edit to a user row.
    pub async fn update_user<F>(&self, id: Uuid, edit: F) -> bool
    where
        F: FnOnce(&mut User),
    {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                edit(user);
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Makes every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        self.check_available()?;
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Duplicate(
                "User with this email already exists".into(),
            ));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            name: new_user.name,
            avatar_url: None,
            subscription_status: SubscriptionStatus::Free,
            usage_count: 0,
            token_version: 0,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn bump_token_version(&self, id: Uuid) -> Result<Option<i32>, StoreError> {
        self.check_available()?;
        Ok(self.users.write().await.get_mut(&id).map(|user| {
            user.token_version += 1;
            user.updated_at = Utc::now();
            user.token_version
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

#[async_trait]
impl ResumeStore for MemoryStore {
    async fn list_resumes(&self, owner: Uuid) -> Result<Vec<ResumeRow>, StoreError> {
        self.check_available()?;
        let mut rows: Vec<ResumeRow> = self
            .resumes
            .read()
            .await
            .values()
            .filter(|r| r.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn find_resume(&self, id: Uuid, owner: Uuid) -> Result<Option<ResumeRow>, StoreError> {
        self.check_available()?;
        Ok(self
            .resumes
            .read()
            .await
            .get(&id)
            .filter(|r| r.user_id == owner)
            .cloned())
    }

    async fn insert_resume(&self, new_resume: NewResume) -> Result<ResumeRow, StoreError> {
        self.check_available()?;
        if !self.users.read().await.contains_key(&new_resume.user_id) {
            return Err(StoreError::Constraint(format!(
                "resumes.user_id references missing user {}",
                new_resume.user_id
            )));
        }
        let now = Utc::now();
        let row = ResumeRow {
            id: Uuid::new_v4(),
            user_id: new_resume.user_id,
            original_content: new_resume.original_content,
            job_description: new_resume.job_description,
            ai_generated_content: None,
            template_used: new_resume.template_used,
            compatibility_score: None,
            s3_file_path: None,
            created_at: now,
            updated_at: now,
        };
        self.resumes.write().await.insert(row.id, row.clone());
        Ok(row)
    }

    async fn delete_resume(&self, id: Uuid, owner: Uuid) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut resumes = self.resumes.write().await;
        let owned = resumes.get(&id).is_some_and(|r| r.user_id == owner);
        if owned {
            resumes.remove(&id);
        }
        Ok(owned)
    }
}
