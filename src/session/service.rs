// src/session/service.rs
// Session records: the human-auditable trail of login episodes.
//
// A session row is not a credential. Tokens are the bearer credential;
// sessions exist so users and admins can see and terminate login episodes.

use rand::Rng;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::errors::ApiResult;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub login_time: i64,
    pub logout_time: Option<i64>,
    pub expires_at: i64,
    pub is_active: bool,
    pub ip_address: String,
    pub user_agent: String,
    pub updated_at: i64,
}

const SESSION_COLUMNS: &str = "session_id, user_id, login_time, logout_time, expires_at, \
                               is_active, ip_address, user_agent, updated_at";

pub struct SessionService {
    db: SqlitePool,
}

impl SessionService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a new active session. This layer allows any number of
    /// concurrent sessions per user; the login flow ends prior ones first
    /// as policy, not as a data-model constraint.
    pub async fn create_session(
        &self,
        user_id: &str,
        ip_address: &str,
        user_agent: &str,
        expires_at: i64,
    ) -> ApiResult<Session> {
        let now = chrono::Utc::now().timestamp();
        let session_id = generate_session_id();

        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, login_time, expires_at, is_active,
                                  ip_address, user_agent, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)
            "#,
        )
        .bind(&session_id)
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .bind(ip_address)
        .bind(user_agent)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        debug!("Created session {} for user {}", session_id, user_id);

        Ok(Session {
            session_id,
            user_id: user_id.to_string(),
            login_time: now,
            logout_time: None,
            expires_at,
            is_active: true,
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            updated_at: now,
        })
    }

    /// Page of active sessions, most recently updated first, plus the total
    /// active count. Backs the "manage your devices" view.
    pub async fn get_sessions(
        &self,
        user_id: &str,
        page: i64,
        limit: i64,
    ) -> ApiResult<(Vec<Session>, i64)> {
        let limit = limit.clamp(1, 100);
        let offset = (page.max(1) - 1) * limit;

        let sessions = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE user_id = ? AND is_active = 1 \
             ORDER BY updated_at DESC LIMIT ? OFFSET ?",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE user_id = ? AND is_active = 1")
                .bind(user_id)
                .fetch_one(&self.db)
                .await?;

        Ok((sessions, total.0))
    }

    /// End one session. Idempotent: returns None when no matching active
    /// session exists. The reported logout time never exceeds the session's
    /// own expiry.
    pub async fn end_session(&self, session_id: &str, user_id: &str) -> ApiResult<Option<Session>> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = 0,
                logout_time = MIN(?, expires_at),
                updated_at = ?
            WHERE session_id = ? AND user_id = ? AND is_active = 1
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(session_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE session_id = ? AND user_id = ?",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(session)
    }

    /// End every active session for the user. Used as a protective action
    /// (password reset, detected token reuse). Returns the count ended.
    pub async fn end_all_sessions(&self, user_id: &str) -> ApiResult<u64> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = 0,
                logout_time = MIN(?, expires_at),
                updated_at = ?
            WHERE user_id = ? AND is_active = 1
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// "Log out everywhere else": end every active session except the
    /// current one. Returns the count ended.
    pub async fn end_all_other_sessions(
        &self,
        user_id: &str,
        current_session_id: &str,
    ) -> ApiResult<u64> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = 0,
                logout_time = MIN(?, expires_at),
                updated_at = ?
            WHERE user_id = ? AND is_active = 1 AND session_id != ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(current_session_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Lookup scoped by both ids so a guessed session id from another
    /// account never resolves.
    pub async fn get_current_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> ApiResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE session_id = ? AND user_id = ? AND is_active = 1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(session)
    }

    /// Housekeeping update on activity (e.g. token refresh), scoped by both
    /// ids like the lookups.
    pub async fn touch_session(&self, session_id: &str, user_id: &str) -> ApiResult<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "UPDATE sessions SET updated_at = ? WHERE session_id = ? AND user_id = ? AND is_active = 1",
        )
        .bind(now)
        .bind(session_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// TTL emulation: deactivate sessions past their expiry. The logout time
    /// recorded is the expiry itself, not the sweep time.
    pub async fn end_expired_sessions(&self) -> ApiResult<u64> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = 0,
                logout_time = expires_at,
                updated_at = ?
            WHERE is_active = 1 AND expires_at <= ?
            "#,
        )
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        let ended = result.rows_affected();
        if ended > 0 {
            debug!("Swept {} expired sessions", ended);
        }
        Ok(ended)
    }

    /// Count of active sessions for a user.
    pub async fn active_session_count(&self, user_id: &str) -> ApiResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sessions WHERE user_id = ? AND is_active = 1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        Ok(row.get("n"))
    }
}

fn generate_session_id() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    format!("sess_{}", hex::encode(bytes))
}
