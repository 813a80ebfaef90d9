// src/api/http/account.rs
// Authenticated account endpoints: profile and device/session management.
// Everything here sits behind the require_auth middleware.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{middleware, Json, Router};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction};
use std::sync::Arc;

use crate::auth::{require_auth, AuthUser};
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;
use crate::tenant::{with_tenant, TenantId};

pub fn create_account_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(me))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{session_id}", delete(end_session))
        .route("/sessions/end-others", post(end_other_sessions))
        .layer(middleware::from_fn(require_auth))
}

/// Band profile as exposed to the dashboard.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BandProfile {
    pub id: String,
    pub band_name: String,
    pub admin_email: String,
    pub role: String,
    pub status: String,
    pub verified: bool,
}

fn load_profile<'c>(
    tx: &'c mut Transaction<'static, Sqlite>,
    tenant: TenantId,
) -> BoxFuture<'c, ApiResult<BandProfile>> {
    Box::pin(async move {
        sqlx::query_as::<_, BandProfile>(
            "SELECT id, band_name, admin_email, role, status, verified FROM users WHERE id = ?",
        )
        .bind(tenant.as_str())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("account not found"))
    })
}

async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let tenant = TenantId::new(auth.user_id.clone());
    let profile = with_tenant(&state.pool, &tenant, load_profile).await?;

    let current_session = state
        .session_service
        .get_current_session(&auth.session_id, &auth.user_id)
        .await?;

    Ok(Json(serde_json::json!({
        "profile": profile,
        "current_session": current_session,
    })))
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<impl IntoResponse> {
    let (sessions, total) = state
        .session_service
        .get_sessions(&auth.user_id, pagination.page, pagination.limit)
        .await?;

    Ok(Json(serde_json::json!({
        "sessions": sessions,
        "total": total,
        "page": pagination.page,
        "limit": pagination.limit,
    })))
}

/// Idempotent from the caller's perspective: ending a session that is
/// already inactive (or never existed) reports ended=false, not an error.
async fn end_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ended = state
        .session_service
        .end_session(&session_id, &auth.user_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "ended": ended.is_some(),
            "session": ended,
        })),
    ))
}

async fn end_other_sessions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let ended = state
        .session_service
        .end_all_other_sessions(&auth.user_id, &auth.session_id)
        .await?;

    Ok(Json(serde_json::json!({ "ended": ended })))
}
