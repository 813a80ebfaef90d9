// src/state.rs
// Application state shared across handlers

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::{AuthService, TokenService};
use crate::cache::RefreshTokenStore;
use crate::config::CONFIG;
use crate::notify::{LogMailer, Mailer};
use crate::session::SessionService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub session_service: Arc<SessionService>,
    pub refresh_tokens: Arc<RefreshTokenStore>,
    pub token_service: Arc<TokenService>,
    pub auth_service: Arc<AuthService>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_mailer(pool, Arc::new(LogMailer))
    }

    /// Wire the service graph around a caller-supplied mail collaborator.
    pub fn with_mailer(pool: SqlitePool, mailer: Arc<dyn Mailer>) -> Self {
        let session_service = Arc::new(SessionService::new(pool.clone()));
        let refresh_tokens = Arc::new(RefreshTokenStore::new(
            pool.clone(),
            CONFIG.auth.refresh_token_ttl_secs,
        ));
        let token_service = Arc::new(TokenService::new(
            pool.clone(),
            refresh_tokens.clone(),
            session_service.clone(),
            mailer.clone(),
        ));
        let auth_service = Arc::new(AuthService::new(
            pool.clone(),
            session_service.clone(),
            token_service.clone(),
            mailer.clone(),
        ));

        Self {
            pool,
            session_service,
            refresh_tokens,
            token_service,
            auth_service,
            mailer,
        }
    }
}
