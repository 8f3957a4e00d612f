use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::{NewResume, ResumeRow, DEFAULT_TEMPLATE};
use crate::response::{ok, ApiResponse};
use crate::state::AppState;
use crate::validation::reject_body;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateResumeRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub original_content: String,
    #[validate(length(min = 1, message = "is required"))]
    pub job_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_used: Option<String>,
}

#[derive(Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<ResumeRow>,
}

#[derive(Serialize)]
pub struct ResumeResponse {
    pub resume: ResumeRow,
}

// Malformed ids are answered exactly like ids that belong to someone else.
fn parse_resume_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| resume_not_found())
}

fn resume_not_found() -> AppError {
    AppError::NotFound("Resume not found".to_string())
}

/// GET /resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<ResumeListResponse>>, AppError> {
    let resumes = state.resumes.list_resumes(auth.id).await?;
    Ok(ok(ResumeListResponse { resumes }))
}

/// GET /resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ResumeResponse>>, AppError> {
    let id = parse_resume_id(&id)?;
    let resume = state
        .resumes
        .find_resume(id, auth.id)
        .await?
        .ok_or_else(resume_not_found)?;
    Ok(ok(ResumeResponse { resume }))
}

/// POST /resumes
pub async fn handle_create_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<CreateResumeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<ResumeResponse>>), AppError> {
    let Json(req) = payload.map_err(reject_body)?;
    let req = CreateResumeRequest {
        original_content: req.original_content.trim().to_string(),
        job_description: req.job_description.trim().to_string(),
        ..req
    };
    req.validate()?;

    let template_used = req
        .template_used
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());

    let resume = state
        .resumes
        .insert_resume(NewResume {
            user_id: auth.id,
            original_content: req.original_content,
            job_description: req.job_description,
            template_used,
        })
        .await?;

    info!(user_id = %auth.id, resume_id = %resume.id, "Resume created");
    Ok((StatusCode::CREATED, ok(ResumeResponse { resume })))
}

/// DELETE /resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_resume_id(&id)?;
    if !state.resumes.delete_resume(id, auth.id).await? {
        return Err(resume_not_found());
    }

    info!(user_id = %auth.id, resume_id = %id, "Resume deleted");
    Ok(Json(json!({
        "success": true,
        "message": "Resume deleted successfully"
    })))
}
