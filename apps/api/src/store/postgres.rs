use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::resume::{NewResume, ResumeRow};
use crate::models::user::{NewUser, User};
use crate::store::{ResumeStore, StoreError, UserStore};

const USER_COLUMNS: &str = "id, email, password_hash, name, avatar_url, subscription_status, \
                            usage_count, token_version, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique(e: sqlx::Error, what: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(what.to_string())
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, name) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&new_user.name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique(e, "User with this email already exists"))
    }

    async fn bump_token_version(&self, id: Uuid) -> Result<Option<i32>, StoreError> {
        Ok(sqlx::query_scalar(
            "UPDATE users SET token_version = token_version + 1, updated_at = now() \
             WHERE id = $1 RETURNING token_version",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ResumeStore for PgStore {
    async fn list_resumes(&self, owner: Uuid) -> Result<Vec<ResumeRow>, StoreError> {
        Ok(sqlx::query_as::<_, ResumeRow>(
            "SELECT * FROM resumes WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_resume(&self, id: Uuid, owner: Uuid) -> Result<Option<ResumeRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(owner)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_resume(&self, new_resume: NewResume) -> Result<ResumeRow, StoreError> {
        Ok(sqlx::query_as::<_, ResumeRow>(
            r#"
            INSERT INTO resumes (id, user_id, original_content, job_description, template_used)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_resume.user_id)
        .bind(&new_resume.original_content)
        .bind(&new_resume.job_description)
        .bind(&new_resume.template_used)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_resume(&self, id: Uuid, owner: Uuid) -> Result<bool, StoreError> {
        // Single owner-scoped statement: no window between check and delete.
        let result = sqlx::query("DELETE FROM resumes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::error::Error as StdError;

    #[derive(Debug, thiserror::Error)]
    #[error("database rejected the statement")]
    struct RejectedStatement(ErrorKind);

    impl DatabaseError for RejectedStatement {
        fn message(&self) -> &str {
            "database rejected the statement"
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.0 {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn rejected(kind: ErrorKind) -> sqlx::Error {
        sqlx::Error::Database(Box::new(RejectedStatement(kind)))
    }

    #[test]
    fn test_unique_violation_becomes_conflict() {
        let err = map_unique(rejected(ErrorKind::UniqueViolation), "email taken");
        assert!(matches!(&err, StoreError::Duplicate(msg) if msg == "email taken"));
        assert!(matches!(AppError::from(err), AppError::Conflict(msg) if msg == "email taken"));
    }

    #[test]
    fn test_other_database_errors_pass_through() {
        assert!(matches!(
            map_unique(rejected(ErrorKind::Other), "email taken"),
            StoreError::Database(_)
        ));
        assert!(matches!(
            map_unique(sqlx::Error::RowNotFound, "email taken"),
            StoreError::Database(sqlx::Error::RowNotFound)
        ));
    }
}
