// src/cache/mod.rs
// Refresh-token cache: a SQLite-backed key-value store with TTL.
//
// One row per user. Overwritten on every login and rotation, which is what
// enforces the single-active-refresh-token policy: a token that no longer
// matches the cached row has been rotated away and presenting it again is a
// reuse signal. Expired rows are dropped lazily on read and swept
// periodically by the task manager.

use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::errors::ApiResult;

/// What was cached when the refresh token was issued. ip/user_agent are the
/// device-binding snapshot compared on every refresh.
#[derive(Debug, Clone)]
pub struct RefreshTokenEntry {
    pub token: String,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: i64,
    pub expires_at: i64,
}

pub struct RefreshTokenStore {
    db: SqlitePool,
    ttl_seconds: i64,
}

impl RefreshTokenStore {
    pub fn new(db: SqlitePool, ttl_seconds: i64) -> Self {
        Self { db, ttl_seconds }
    }

    /// Unconditionally overwrite the entry for this user. The previous
    /// refresh token, if any, becomes invalid the moment this returns.
    pub async fn put(
        &self,
        user_id: &str,
        token: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> ApiResult<()> {
        let now = chrono::Utc::now().timestamp();
        let expires_at = now + self.ttl_seconds;

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token, ip_address, user_agent, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                token = excluded.token,
                ip_address = excluded.ip_address,
                user_agent = excluded.user_agent,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(ip_address)
        .bind(user_agent)
        .bind(now)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        debug!("Cached refresh token for user {}", user_id);
        Ok(())
    }

    /// Get the cached entry, dropping it if the TTL has passed.
    pub async fn get(&self, user_id: &str) -> ApiResult<Option<RefreshTokenEntry>> {
        let row = sqlx::query(
            r#"
            SELECT token, ip_address, user_agent, created_at, expires_at
            FROM refresh_tokens
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let entry = RefreshTokenEntry {
            token: row.get("token"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        };

        if chrono::Utc::now().timestamp() >= entry.expires_at {
            debug!("Refresh token entry expired for user {}", user_id);
            self.delete(user_id).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    pub async fn delete(&self, user_id: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Remove all expired entries. Returns the number purged.
    pub async fn purge_expired(&self) -> ApiResult<u64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.db)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            debug!("Purged {} expired refresh token entries", purged);
        }
        Ok(purged)
    }
}
