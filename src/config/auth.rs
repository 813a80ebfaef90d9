// src/config/auth.rs
// Token signing, cookie, and account-lockout configuration

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// True when APP_ENV=production. Controls secret strictness and the
    /// Secure/Domain attributes on auth cookies.
    pub production: bool,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    /// Secret for one-shot signed links (email verification, password reset).
    pub link_token_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub session_ttl_secs: i64,
    pub two_factor_ttl_secs: i64,
    pub max_failed_logins: i64,
    pub lockout_secs: i64,
    pub cookie_domain: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let production = super::helpers::env_or("APP_ENV", "development") == "production";

        Self {
            production,
            access_token_secret: secret_or_throwaway("ACCESS_TOKEN_SECRET", production),
            refresh_token_secret: secret_or_throwaway("REFRESH_TOKEN_SECRET", production),
            link_token_secret: secret_or_throwaway("LINK_TOKEN_SECRET", production),
            access_token_ttl_secs: super::helpers::env_i64("ACCESS_TOKEN_TTL_SECS", 3600),
            refresh_token_ttl_secs: super::helpers::env_i64(
                "REFRESH_TOKEN_TTL_SECS",
                7 * 24 * 3600,
            ),
            session_ttl_secs: super::helpers::env_i64("SESSION_TTL_SECS", 7 * 24 * 3600),
            two_factor_ttl_secs: super::helpers::env_i64("TWO_FACTOR_TTL_SECS", 600),
            max_failed_logins: super::helpers::env_i64("MAX_FAILED_LOGINS", 5),
            lockout_secs: super::helpers::env_i64("LOCKOUT_SECS", 900),
            cookie_domain: std::env::var("COOKIE_DOMAIN").ok().filter(|d| !d.is_empty()),
        }
    }
}

/// Production refuses to start without a signing secret. Everywhere else a
/// random throwaway secret is generated so local setups work out of the box;
/// tokens will not survive a restart. Do not carry this into production.
fn secret_or_throwaway(key: &str, production: bool) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ if production => panic!("Missing required env var: {}", key),
        _ => {
            let bytes: [u8; 32] = rand::thread_rng().gen();
            warn!(
                "{} not set, using a generated throwaway secret (development only)",
                key
            );
            hex::encode(bytes)
        }
    }
}
