// src/api/http/auth.rs
// Public authentication endpoints. Thin controllers over AuthService and
// TokenService; all error mapping happens in ApiError::into_response.

use axum::extract::{ConnectInfo, Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::auth::{jwt, LoginOutcome, LoginRequest, RegisterRequest, TwoFactorRequest};
use crate::errors::ApiResult;
use crate::state::AppState;

use super::cookies::{clear_auth_cookies, get_cookie, set_auth_cookies, ACCESS_COOKIE, REFRESH_COOKIE};

pub fn create_auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-2fa", post(verify_two_factor))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/password-reset/request", post(request_password_reset))
        .route("/password-reset/confirm", post(confirm_password_reset))
        .route("/verify-email", post(verify_email))
}

fn client_meta(headers: &HeaderMap, addr: &SocketAddr) -> (String, String) {
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    (addr.ip().to_string(), user_agent)
}

async fn register(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Response> {
    let (ip, user_agent) = client_meta(&headers, &addr);
    let login = state.auth_service.register(req, &ip, &user_agent).await?;

    let mut response = (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "user": login.user,
            "session_id": login.session.session_id,
        })),
    )
        .into_response();
    set_auth_cookies(response.headers_mut(), &login.tokens)?;
    Ok(response)
}

async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let (ip, user_agent) = client_meta(&headers, &addr);

    match state.auth_service.login(req, &ip, &user_agent).await? {
        LoginOutcome::TwoFactorRequired => Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "two_factor_required": true })),
        )
            .into_response()),
        LoginOutcome::LoggedIn(login) => {
            let mut response = (
                StatusCode::OK,
                Json(serde_json::json!({
                    "user": login.user,
                    "session_id": login.session.session_id,
                })),
            )
                .into_response();
            set_auth_cookies(response.headers_mut(), &login.tokens)?;
            Ok(response)
        }
    }
}

async fn verify_two_factor(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<TwoFactorRequest>,
) -> ApiResult<Response> {
    let (ip, user_agent) = client_meta(&headers, &addr);
    let login = state
        .auth_service
        .verify_two_factor(req, &ip, &user_agent)
        .await?;

    let mut response = (
        StatusCode::OK,
        Json(serde_json::json!({
            "user": login.user,
            "session_id": login.session.session_id,
        })),
    )
        .into_response();
    set_auth_cookies(response.headers_mut(), &login.tokens)?;
    Ok(response)
}

/// Exchange the refresh cookie for a rotated token pair. The presented
/// refresh token is dead after this call either way: rotated away on
/// success, revoked on detected reuse.
async fn refresh(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let (ip, user_agent) = client_meta(&headers, &addr);
    let refresh_cookie = get_cookie(&headers, REFRESH_COOKIE);

    let rotated = state
        .token_service
        .refresh_access_token(refresh_cookie.as_deref(), &ip, &user_agent)
        .await?;

    // The account may have been deactivated since the token was minted.
    state.auth_service.verify_user_id(&rotated.user_id).await?;

    let mut response = (
        StatusCode::OK,
        Json(serde_json::json!({ "user_id": rotated.user_id })),
    )
        .into_response();
    set_auth_cookies(response.headers_mut(), &rotated.pair)?;
    Ok(response)
}

/// Idempotent: clears cookies even when the access token is already gone
/// or expired.
async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    if let Some(token) = get_cookie(&headers, ACCESS_COOKIE) {
        if let Ok(claims) = jwt::verify_access_token(&token) {
            state.auth_service.logout(&claims.sub, &claims.uuid).await?;
        }
    }

    let mut response = (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "logged_out" })),
    )
        .into_response();
    clear_auth_cookies(response.headers_mut())?;
    Ok(response)
}

#[derive(Deserialize)]
struct PasswordResetRequest {
    admin_email: String,
}

async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetRequest>,
) -> ApiResult<Response> {
    state.auth_service.request_password_reset(&req.admin_email).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok" })),
    )
        .into_response())
}

#[derive(Deserialize)]
struct PasswordResetConfirm {
    token: String,
    new_password: String,
}

async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetConfirm>,
) -> ApiResult<Response> {
    state
        .auth_service
        .confirm_password_reset(&req.token, &req.new_password)
        .await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "status": "password_updated" })),
    )
        .into_response())
}

#[derive(Deserialize)]
struct VerifyEmailRequest {
    token: String,
}

async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyEmailRequest>,
) -> ApiResult<Response> {
    state.auth_service.verify_email(&req.token).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "status": "verified" })),
    )
        .into_response())
}
