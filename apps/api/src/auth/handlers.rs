use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::auth::guard::AuthUser;
use crate::auth::service::{
    self, AuthResponse, LoginRequest, MeResponse, RefreshRequest, RegisterRequest,
};
use crate::errors::AppError;
use crate::response::{ok, ApiResponse};
use crate::state::AppState;
use crate::validation::reject_body;

/// POST /auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), AppError> {
    let Json(req) = payload.map_err(reject_body)?;
    let session = service::register(state.users.as_ref(), &state.tokens, req).await?;
    Ok((StatusCode::CREATED, ok(session)))
}

/// POST /auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let Json(req) = payload.map_err(reject_body)?;
    let session = service::login(state.users.as_ref(), &state.tokens, req).await?;
    Ok(ok(session))
}

/// GET /auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<MeResponse>>, AppError> {
    let profile = service::me(state.users.as_ref(), Some(&auth)).await?;
    Ok(ok(profile))
}

/// POST /auth/refresh
pub async fn handle_refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let Json(req) = payload.map_err(reject_body)?;
    let session = service::refresh(state.users.as_ref(), &state.tokens, req).await?;
    Ok(ok(session))
}

/// POST /auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError> {
    service::logout(state.users.as_ref(), &auth).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Logged out; all sessions revoked"
    })))
}
