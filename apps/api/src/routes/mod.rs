pub mod health;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, Request,
    },
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::handlers as auth;
use crate::errors::AppError;
use crate::resumes::handlers as resumes;
use crate::state::AppState;

async fn not_implemented() -> Result<(), AppError> {
    Err(AppError::NotImplemented)
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("CORS_ORIGIN '{origin}' is not a valid header value"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::readiness_handler))
        .route("/auth/register", post(auth::handle_register))
        .route("/auth/login", post(auth::handle_login))
        .route("/auth/me", get(auth::handle_me))
        .route("/auth/refresh", post(auth::handle_refresh))
        .route("/auth/logout", post(auth::handle_logout))
        .route(
            "/resumes",
            get(resumes::handle_list_resumes).post(resumes::handle_create_resume),
        )
        .route(
            "/resumes/:id",
            get(resumes::handle_get_resume).delete(resumes::handle_delete_resume),
        )
        // AI, portfolio and subscription features are not built yet
        .route("/ai/rewrite-resume", post(not_implemented))
        .route("/ai/generate-cover-letter", post(not_implemented))
        .route("/ai/calculate-compatibility", post(not_implemented))
        .route("/portfolios/generate", post(not_implemented))
        .route("/portfolios/:id", get(not_implemented).put(not_implemented))
        .route("/subscriptions/create", post(not_implemented))
        .route("/subscriptions/status", get(not_implemented))
        .route("/subscriptions/cancel", post(not_implemented))
}

pub fn build_router(state: AppState) -> Result<Router> {
    let cors = cors_layer(&state.config.cors_origin)?;
    let prefix = state.config.api_prefix.clone();

    // `user_id` starts empty and is filled in by the auth guard.
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            user_id = tracing::field::Empty,
        )
    });

    Ok(Router::new()
        .route("/health", get(health::health_handler))
        .nest(&prefix, api_routes())
        .fallback(not_found)
        .with_state(state)
        .layer(trace)
        .layer(cors))
}
