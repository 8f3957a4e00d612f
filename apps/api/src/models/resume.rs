use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_TEMPLATE: &str = "tech-focused";

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRow {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub original_content: String,
    pub job_description: String,
    pub ai_generated_content: Option<String>,
    pub template_used: String,
    pub compatibility_score: Option<f64>,
    pub s3_file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewResume {
    pub user_id: Uuid,
    pub original_content: String,
    pub job_description: String,
    pub template_used: String,
}
