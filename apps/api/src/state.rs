use std::sync::Arc;
use std::time::Instant;

use crate::auth::TokenIssuer;
use crate::config::Config;
use crate::store::{ResumeStore, UserStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub resumes: Arc<dyn ResumeStore>,
    pub tokens: Arc<TokenIssuer>,
    pub config: Config,
    pub started_at: Instant,
}

impl AppState {
    /// Wires state around a single store that serves both users and resumes.
    pub fn new<S>(store: Arc<S>, config: Config) -> Self
    where
        S: UserStore + ResumeStore + 'static,
    {
        let tokens = Arc::new(TokenIssuer::new(&config.jwt));
        AppState {
            users: store.clone(),
            resumes: store,
            tokens,
            config,
            started_at: Instant::now(),
        }
    }
}
