// src/auth/tokens.rs
// Token lifecycle: mint the access/refresh pair, rotate on refresh, and
// detect replay of rotated refresh tokens.
//
// Invariant: at most one valid refresh token per user. Every issue
// overwrites the cached entry, so presenting a token that no longer matches
// the cache means it was already rotated (or the user logged out) and is
// treated as compromise. Note the known edge: a legitimate client retrying
// its own refresh after a successful rotation trips the same detection and
// is logged out everywhere. That fail-secure behavior is kept on purpose.

use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::warn;

use crate::cache::RefreshTokenStore;
use crate::errors::{ApiError, ApiResult};
use crate::notify::Mailer;
use crate::session::SessionService;

use super::jwt::{self, TokenClaims, TokenIdentity};

/// Freshly minted access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful refresh rotation.
#[derive(Debug, Clone)]
pub struct RotatedTokens {
    pub user_id: String,
    pub session_id: String,
    pub pair: TokenPair,
}

pub struct TokenService {
    db: SqlitePool,
    store: Arc<RefreshTokenStore>,
    sessions: Arc<SessionService>,
    mailer: Arc<dyn Mailer>,
}

impl TokenService {
    pub fn new(
        db: SqlitePool,
        store: Arc<RefreshTokenStore>,
        sessions: Arc<SessionService>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            db,
            store,
            sessions,
            mailer,
        }
    }

    /// Mint an access+refresh pair and overwrite the user's cached refresh
    /// entry. Any previously issued refresh token for this user is invalid
    /// once this returns.
    pub async fn issue_pair(
        &self,
        identity: &TokenIdentity,
        ip_address: &str,
        user_agent: &str,
    ) -> ApiResult<TokenPair> {
        let access_token = jwt::create_access_token(identity)?;
        let refresh_token = jwt::create_refresh_token(identity)?;

        self.store
            .put(&identity.user_id, &refresh_token, ip_address, user_agent)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Validate a presented refresh token against the cached copy.
    ///
    /// The ip/user-agent comparison is a weak device-binding heuristic:
    /// proxies and mobile networks rotate addresses and user-agents are
    /// attacker-controlled. It is kept as a hard check here to match the
    /// current product behavior; a future port should fold it into an
    /// anomaly score instead of treating it as a boundary.
    pub async fn verify_refresh_token(
        &self,
        token: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> ApiResult<TokenClaims> {
        let claims = jwt::decode_refresh_token(token)?;

        let entry = self
            .store
            .get(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::not_found("no refresh token on record"))?;

        if entry.token != token {
            warn!(
                user_id = %claims.sub,
                "refresh token reuse detected, ending all sessions"
            );
            self.revoke_user(&claims.sub).await?;
            return Err(ApiError::authorization("refresh token reuse detected"));
        }

        if entry.ip_address != ip_address || entry.user_agent != user_agent {
            warn!(
                user_id = %claims.sub,
                "refresh token presented from an unrecognized device, ending all sessions"
            );
            self.revoke_user(&claims.sub).await?;
            return Err(ApiError::authorization("possible refresh token theft"));
        }

        Ok(claims)
    }

    /// Full refresh flow: cookie value in, rotated pair out. The old refresh
    /// token is invalid after this returns (single-active-token rotation).
    pub async fn refresh_access_token(
        &self,
        refresh_cookie: Option<&str>,
        ip_address: &str,
        user_agent: &str,
    ) -> ApiResult<RotatedTokens> {
        let token = refresh_cookie
            .ok_or_else(|| ApiError::authentication("missing refresh token cookie"))?;

        let claims = self.verify_refresh_token(token, ip_address, user_agent).await?;
        let identity = TokenIdentity::from(&claims);

        let pair = self.issue_pair(&identity, ip_address, user_agent).await?;

        self.sessions
            .touch_session(&identity.session_id, &identity.user_id)
            .await?;

        Ok(RotatedTokens {
            user_id: identity.user_id,
            session_id: identity.session_id,
            pair,
        })
    }

    /// Protective revocation: drop the cached refresh token and end every
    /// session. Runs before the triggering error propagates.
    pub async fn revoke_user(&self, user_id: &str) -> ApiResult<()> {
        self.store.delete(user_id).await?;
        let ended = self.sessions.end_all_sessions(user_id).await?;
        warn!("Revoked credentials for user {} ({} sessions ended)", user_id, ended);

        // Best effort; a mail failure must not mask the revocation.
        let email = sqlx::query("SELECT admin_email FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .map(|row| row.get::<String, _>("admin_email"));

        if let Some(email) = email {
            if let Err(err) = self
                .mailer
                .send(
                    &email,
                    "Security alert: sessions ended",
                    "We detected unusual activity on your account and signed you out everywhere. \
                     If this was not you, reset your password.",
                )
                .await
            {
                warn!("Failed to send security alert for user {}: {}", user_id, err);
            }
        }

        Ok(())
    }

    /// Drop the cached refresh token only (normal logout path).
    pub async fn discard_refresh_token(&self, user_id: &str) -> ApiResult<()> {
        self.store.delete(user_id).await
    }
}
