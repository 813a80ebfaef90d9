// src/auth/jwt.rs
// Access and refresh token signing/verification

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::CONFIG;
use crate::errors::{ApiError, ApiResult};

/// Account role. Stored as TEXT in the users table, carried typed in claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "SUPERADMIN")]
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::Superadmin => "SUPERADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            "SUPERADMIN" => Some(Role::Superadmin),
            _ => None,
        }
    }
}

/// Claims carried by both access and refresh tokens. A complete, typed
/// record: a token cannot be minted with fields missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id.
    pub sub: String,
    /// Session id the token was minted for.
    pub uuid: String,
    pub role: Role,
    pub user_type: String,
    pub iat: usize,
    pub exp: usize,
}

/// The identity a token pair is minted for.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub user_id: String,
    pub session_id: String,
    pub role: Role,
    pub user_type: String,
}

impl From<&TokenClaims> for TokenIdentity {
    fn from(claims: &TokenClaims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            session_id: claims.uuid.clone(),
            role: claims.role,
            user_type: claims.user_type.clone(),
        }
    }
}

fn sign(identity: &TokenIdentity, secret: &str, ttl_secs: i64) -> ApiResult<String> {
    let iat = chrono::Utc::now().timestamp();
    let claims = TokenClaims {
        sub: identity.user_id.clone(),
        uuid: identity.session_id.clone(),
        role: identity.role,
        user_type: identity.user_type.clone(),
        iat: iat as usize,
        exp: (iat + ttl_secs) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::internal(format!("failed to sign token: {}", e)))
}

fn verify(token: &str, secret: &str) -> ApiResult<TokenClaims> {
    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::authentication("invalid or expired token"))
}

/// Mint a short-lived access token (1h by default).
pub fn create_access_token(identity: &TokenIdentity) -> ApiResult<String> {
    sign(
        identity,
        &CONFIG.auth.access_token_secret,
        CONFIG.auth.access_token_ttl_secs,
    )
}

/// Mint a refresh token (7 days by default). Caching the token against the
/// user is the caller's job; the signature alone does not make it valid.
pub fn create_refresh_token(identity: &TokenIdentity) -> ApiResult<String> {
    sign(
        identity,
        &CONFIG.auth.refresh_token_secret,
        CONFIG.auth.refresh_token_ttl_secs,
    )
}

pub fn verify_access_token(token: &str) -> ApiResult<TokenClaims> {
    verify(token, &CONFIG.auth.access_token_secret)
}

/// Signature/expiry check only; reuse detection happens in TokenService.
pub fn decode_refresh_token(token: &str) -> ApiResult<TokenClaims> {
    verify(token, &CONFIG.auth.refresh_token_secret)
}
