// src/auth/middleware.rs
// Stateless per-request gate: signed access-token cookie in, claims on the
// request extensions out, 401 otherwise. No database work here.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::http::cookies::{get_cookie, ACCESS_COOKIE};
use crate::errors::ApiError;

use super::jwt::{self, Role};

/// Verified caller identity, attached to the request by `require_auth`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub session_id: String,
    pub role: Role,
}

pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let token = get_cookie(req.headers(), ACCESS_COOKIE)
        .ok_or_else(|| ApiError::authentication("missing access token cookie"))?;

    let claims = jwt::verify_access_token(&token)?;

    req.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        session_id: claims.uuid,
        role: claims.role,
    });

    Ok(next.run(req).await)
}
