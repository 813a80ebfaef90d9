// src/auth/service.rs
// Core business logic for the authentication system: registration, login
// with lockout and optional 2FA, logout, password reset, email verification.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CONFIG;
use crate::errors::{ApiError, ApiResult};
use crate::notify::Mailer;
use crate::session::{Session, SessionService};

use super::jwt::{Role, TokenIdentity};
use super::password::{hash_password, verify_password};
use super::signed_link::{generate_signed_token, verify_signed_token, LinkPayload, LinkPurpose};
use super::tokens::{TokenPair, TokenService};

/// Full user row. Password hash never leaves this module.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub band_name: String,
    pub admin_email: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub verified: bool,
    pub two_factor_enabled: bool,
    pub two_factor_code: Option<String>,
    pub two_factor_expires_at: Option<i64>,
    pub failed_login_attempts: i64,
    pub locked_until: Option<i64>,
    pub security_preferences: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_login_at: Option<i64>,
}

/// The shape handed to callers and serialized onto the wire.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub band_name: String,
    pub admin_email: String,
    pub role: String,
    pub status: String,
    pub verified: bool,
}

impl From<UserRecord> for PublicUser {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            band_name: user.band_name,
            admin_email: user.admin_email,
            role: user.role,
            status: user.status,
            verified: user.verified,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub band_name: String,
    pub admin_email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub admin_email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TwoFactorRequest {
    pub admin_email: String,
    pub code: String,
}

/// Successful login: the session record plus the token pair for cookies.
#[derive(Debug)]
pub struct AuthenticatedLogin {
    pub user: PublicUser,
    pub session: Session,
    pub tokens: TokenPair,
}

#[derive(Debug)]
pub enum LoginOutcome {
    /// Credentials were valid but the account requires a 2FA code.
    TwoFactorRequired,
    LoggedIn(Box<AuthenticatedLogin>),
}

pub struct AuthService {
    db: SqlitePool,
    sessions: Arc<SessionService>,
    tokens: Arc<TokenService>,
    mailer: Arc<dyn Mailer>,
}

impl AuthService {
    pub fn new(
        db: SqlitePool,
        sessions: Arc<SessionService>,
        tokens: Arc<TokenService>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            db,
            sessions,
            tokens,
            mailer,
        }
    }

    pub async fn register(
        &self,
        req: RegisterRequest,
        ip_address: &str,
        user_agent: &str,
    ) -> ApiResult<AuthenticatedLogin> {
        if req.band_name.trim().is_empty() {
            return Err(ApiError::validation("Band name is required"));
        }
        if !req.admin_email.contains('@') {
            return Err(ApiError::validation("A valid email address is required"));
        }
        if req.password.len() < 8 {
            return Err(ApiError::validation("Password must be at least 8 characters"));
        }
        if self.email_exists(&req.admin_email).await? {
            return Err(ApiError::validation("Email already registered"));
        }

        let user_id = Uuid::new_v4().to_string();
        let password_hash = hash_password(&req.password)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO users (id, band_name, admin_email, password_hash, role, status,
                               verified, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'USER', 'ACTIVE', 0, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(req.band_name.trim())
        .bind(&req.admin_email)
        .bind(&password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        info!("Registered new band account {}", user_id);

        self.send_verification_link(&user_id, &req.admin_email).await;

        let user = self.get_user_by_id(&user_id).await?;
        self.complete_login(user, ip_address, user_agent).await
    }

    /// Validate credentials and either complete the login or park it behind
    /// a 2FA challenge. All failures collapse to the same generic
    /// authentication error so callers cannot enumerate accounts.
    pub async fn login(
        &self,
        req: LoginRequest,
        ip_address: &str,
        user_agent: &str,
    ) -> ApiResult<LoginOutcome> {
        let Some(user) = self.get_user_by_email(&req.admin_email).await? else {
            return Err(ApiError::authentication("unknown email"));
        };

        if user.status != "ACTIVE" {
            return Err(ApiError::authentication("account is inactive"));
        }

        let now = chrono::Utc::now().timestamp();

        // Locked accounts fail before the password is ever checked.
        if let Some(locked_until) = user.locked_until {
            if locked_until > now {
                warn!("Login attempt on locked account {}", user.id);
                return Err(ApiError::authentication("account temporarily locked"));
            }
        }

        if !verify_password(&req.password, &user.password_hash)? {
            self.record_failed_login(&user, now).await?;
            return Err(ApiError::authentication("invalid credentials"));
        }

        self.clear_failed_logins(&user.id, now).await?;

        if user.two_factor_enabled {
            self.begin_two_factor(&user, now).await?;
            return Ok(LoginOutcome::TwoFactorRequired);
        }

        let login = self.complete_login(user, ip_address, user_agent).await?;
        Ok(LoginOutcome::LoggedIn(Box::new(login)))
    }

    /// Second step of a 2FA login.
    pub async fn verify_two_factor(
        &self,
        req: TwoFactorRequest,
        ip_address: &str,
        user_agent: &str,
    ) -> ApiResult<AuthenticatedLogin> {
        let Some(user) = self.get_user_by_email(&req.admin_email).await? else {
            return Err(ApiError::authentication("unknown email"));
        };
        if user.status != "ACTIVE" {
            return Err(ApiError::authentication("account is inactive"));
        }

        let now = chrono::Utc::now().timestamp();
        let valid = match (&user.two_factor_code, user.two_factor_expires_at) {
            (Some(code), Some(expires_at)) => *code == req.code && expires_at > now,
            _ => false,
        };
        if !valid {
            return Err(ApiError::authentication("invalid or expired 2FA code"));
        }

        sqlx::query(
            "UPDATE users SET two_factor_code = NULL, two_factor_expires_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(&user.id)
        .execute(&self.db)
        .await?;

        self.complete_login(user, ip_address, user_agent).await
    }

    /// End the session and drop the cached refresh token.
    pub async fn logout(&self, user_id: &str, session_id: &str) -> ApiResult<()> {
        self.sessions.end_session(session_id, user_id).await?;
        self.tokens.discard_refresh_token(user_id).await?;
        debug!("Logged out session {} for user {}", session_id, user_id);
        Ok(())
    }

    /// Always succeeds from the caller's perspective so the endpoint cannot
    /// be used to enumerate registered addresses.
    pub async fn request_password_reset(&self, email: &str) -> ApiResult<()> {
        let Some(user) = self.get_user_by_email(email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let payload = LinkPayload::new(&user.id, LinkPurpose::PasswordReset, 3600);
        let token = generate_signed_token(&payload)?;
        let link = format!(
            "{}/reset-password?token={}",
            CONFIG.server.public_base_url, token
        );

        if let Err(err) = self
            .mailer
            .send(
                &user.admin_email,
                "Reset your password",
                &format!("Use this link within one hour to reset your password: {}", link),
            )
            .await
        {
            warn!("Failed to send password reset mail for {}: {}", user.id, err);
        }

        Ok(())
    }

    /// Verify the one-shot link, set the new password, and revoke every
    /// outstanding credential for the account.
    pub async fn confirm_password_reset(&self, token: &str, new_password: &str) -> ApiResult<()> {
        let Some(payload) = verify_signed_token(token) else {
            return Err(ApiError::authentication("invalid or expired reset link"));
        };
        if payload.purpose != LinkPurpose::PasswordReset {
            return Err(ApiError::authentication("invalid or expired reset link"));
        }
        if new_password.len() < 8 {
            return Err(ApiError::validation("Password must be at least 8 characters"));
        }

        let password_hash = hash_password(new_password)?;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, failed_login_attempts = 0, locked_until = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&password_hash)
        .bind(now)
        .bind(&payload.user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::authentication("invalid or expired reset link"));
        }

        // Forced termination: old sessions and refresh token die with the
        // old password.
        self.tokens.revoke_user(&payload.user_id).await?;
        info!("Password reset completed for user {}", payload.user_id);
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> ApiResult<()> {
        let Some(payload) = verify_signed_token(token) else {
            return Err(ApiError::authentication("invalid or expired verification link"));
        };
        if payload.purpose != LinkPurpose::VerifyEmail {
            return Err(ApiError::authentication("invalid or expired verification link"));
        }

        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("UPDATE users SET verified = 1, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(&payload.user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::authentication("invalid or expired verification link"));
        }

        info!("Email verified for user {}", payload.user_id);
        Ok(())
    }

    /// Active-account lookup for handlers that already hold a verified
    /// token and need the current user state.
    pub async fn verify_user_id(&self, user_id: &str) -> ApiResult<PublicUser> {
        let user = self.get_user_by_id(user_id).await?;
        if user.status != "ACTIVE" {
            return Err(ApiError::authentication("account is inactive"));
        }
        Ok(user.into())
    }

    // --- internals ---

    /// Shared tail of every successful authentication: enforce the
    /// one-active-session policy, create the session row, mint the token
    /// pair (caching the refresh token), stamp last login.
    async fn complete_login(
        &self,
        user: UserRecord,
        ip_address: &str,
        user_agent: &str,
    ) -> ApiResult<AuthenticatedLogin> {
        let ended = self.sessions.end_all_sessions(&user.id).await?;
        if ended > 0 {
            debug!("Ended {} prior sessions for user {}", ended, user.id);
        }

        let now = chrono::Utc::now().timestamp();
        let session = self
            .sessions
            .create_session(
                &user.id,
                ip_address,
                user_agent,
                now + CONFIG.auth.session_ttl_secs,
            )
            .await?;

        let identity = TokenIdentity {
            user_id: user.id.clone(),
            session_id: session.session_id.clone(),
            role: Role::parse(&user.role).unwrap_or(Role::User),
            user_type: "band".to_string(),
        };
        let tokens = self.tokens.issue_pair(&identity, ip_address, user_agent).await?;

        sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(&user.id)
            .execute(&self.db)
            .await?;

        info!("User {} logged in from {}", user.id, ip_address);

        Ok(AuthenticatedLogin {
            user: user.into(),
            session,
            tokens,
        })
    }

    async fn record_failed_login(&self, user: &UserRecord, now: i64) -> ApiResult<()> {
        let attempts = user.failed_login_attempts + 1;

        if attempts >= CONFIG.auth.max_failed_logins {
            let locked_until = now + CONFIG.auth.lockout_secs;
            sqlx::query(
                r#"
                UPDATE users
                SET failed_login_attempts = 0, locked_until = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(locked_until)
            .bind(now)
            .bind(&user.id)
            .execute(&self.db)
            .await?;

            warn!(
                "Account {} locked until {} after {} failed logins",
                user.id, locked_until, attempts
            );
        } else {
            sqlx::query(
                "UPDATE users SET failed_login_attempts = ?, updated_at = ? WHERE id = ?",
            )
            .bind(attempts)
            .bind(now)
            .bind(&user.id)
            .execute(&self.db)
            .await?;
        }

        Ok(())
    }

    async fn clear_failed_logins(&self, user_id: &str, now: i64) -> ApiResult<()> {
        sqlx::query(
            "UPDATE users SET failed_login_attempts = 0, locked_until = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn begin_two_factor(&self, user: &UserRecord, now: i64) -> ApiResult<()> {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        let expires_at = now + CONFIG.auth.two_factor_ttl_secs;

        sqlx::query(
            "UPDATE users SET two_factor_code = ?, two_factor_expires_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&code)
        .bind(expires_at)
        .bind(now)
        .bind(&user.id)
        .execute(&self.db)
        .await?;

        if let Err(err) = self
            .mailer
            .send(
                &user.admin_email,
                "Your login code",
                &format!("Your verification code is {}. It expires in 10 minutes.", code),
            )
            .await
        {
            warn!("Failed to send 2FA code for {}: {}", user.id, err);
        }

        Ok(())
    }

    async fn send_verification_link(&self, user_id: &str, email: &str) {
        let payload = LinkPayload::new(user_id, LinkPurpose::VerifyEmail, 24 * 3600);
        let token = match generate_signed_token(&payload) {
            Ok(token) => token,
            Err(err) => {
                warn!("Failed to build verification link for {}: {}", user_id, err);
                return;
            }
        };
        let link = format!("{}/verify-email?token={}", CONFIG.server.public_base_url, token);

        if let Err(err) = self
            .mailer
            .send(
                email,
                "Verify your email",
                &format!("Welcome! Confirm your email within 24 hours: {}", link),
            )
            .await
        {
            warn!("Failed to send verification mail for {}: {}", user_id, err);
        }
    }

    async fn get_user_by_email(&self, email: &str) -> ApiResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE admin_email = ?")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: &str) -> ApiResult<UserRecord> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::not_found("user not found"))
    }

    async fn email_exists(&self, email: &str) -> ApiResult<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE admin_email = ?")
            .bind(email)
            .fetch_one(&self.db)
            .await?;
        Ok(count.0 > 0)
    }
}
