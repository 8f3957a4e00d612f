//! HTTP client for the backend API, as used by the web tier.

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::auth::service::{AuthResponse, MeResponse};
use crate::models::user::PublicUser;
use crate::resumes::handlers::CreateResumeRequest;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl BackendError {
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            BackendError::Http(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// A resume as the backend returns it. The owner is implied by the bearer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    pub id: Uuid,
    pub original_content: String,
    pub job_description: String,
    pub ai_generated_content: Option<String>,
    pub template_used: String,
    pub compatibility_score: Option<f64>,
    pub s3_file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ResumeList {
    resumes: Vec<Resume>,
}

#[derive(Deserialize)]
struct ResumeEnvelope {
    resume: Resume,
}

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    /// `base_url` includes the API prefix, e.g. `http://localhost:3001/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, BackendError> {
        self.send(
            self.http
                .post(self.url("/auth/register"))
                .json(&json!({ "name": name, "email": email, "password": password })),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError> {
        self.send(
            self.http
                .post(self.url("/auth/login"))
                .json(&json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn me(&self, access_token: &str) -> Result<PublicUser, BackendError> {
        let me: MeResponse = self
            .send(self.http.get(self.url("/auth/me")).bearer_auth(access_token))
            .await?;
        Ok(me.user)
    }

    pub async fn list_resumes(&self, access_token: &str) -> Result<Vec<Resume>, BackendError> {
        let list: ResumeList = self
            .send(self.http.get(self.url("/resumes")).bearer_auth(access_token))
            .await?;
        Ok(list.resumes)
    }

    pub async fn get_resume(&self, access_token: &str, id: Uuid) -> Result<Resume, BackendError> {
        let found: ResumeEnvelope = self
            .send(
                self.http
                    .get(self.url(&format!("/resumes/{id}")))
                    .bearer_auth(access_token),
            )
            .await?;
        Ok(found.resume)
    }

    pub async fn create_resume(
        &self,
        access_token: &str,
        resume: &CreateResumeRequest,
    ) -> Result<Resume, BackendError> {
        let created: ResumeEnvelope = self
            .send(
                self.http
                    .post(self.url("/resumes"))
                    .bearer_auth(access_token)
                    .json(resume),
            )
            .await?;
        Ok(created.resume)
    }

    /// The backend answers a delete with a bare message and no `data`.
    pub async fn delete_resume(&self, access_token: &str, id: Uuid) -> Result<(), BackendError> {
        self.execute(
            self.http
                .delete(self.url(&format!("/resumes/{id}")))
                .bearer_auth(access_token),
        )
        .await?;
        Ok(())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let envelope: Envelope<T> = self.execute(request).await?.json().await?;
        Ok(envelope.data)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let (code, message) = match response.json::<ErrorEnvelope>().await {
            Ok(body) => (body.error.code, body.error.message),
            Err(_) => ("UNKNOWN".to_string(), status.to_string()),
        };
        debug!("Backend call failed with {status}: {code}");
        Err(BackendError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }
}
