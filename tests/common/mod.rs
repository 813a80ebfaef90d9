// tests/common/mod.rs
// Shared helpers for integration tests.
#![allow(dead_code)]

use encore_backend::auth::{AuthenticatedLogin, RegisterRequest};
use encore_backend::state::AppState;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub const TEST_IP: &str = "203.0.113.7";
pub const TEST_UA: &str = "integration-test-agent";

pub async fn test_pool() -> SqlitePool {
    // Single connection: every pooled connection to sqlite::memory: would
    // otherwise open its own empty database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    pool
}

pub async fn test_state() -> AppState {
    AppState::new(test_pool().await)
}

/// Register a band account and return the completed login.
pub async fn register_band(state: &AppState, email: &str) -> AuthenticatedLogin {
    state
        .auth_service
        .register(
            RegisterRequest {
                band_name: "The Integration Tests".to_string(),
                admin_email: email.to_string(),
                password: "correct horse battery".to_string(),
            },
            TEST_IP,
            TEST_UA,
        )
        .await
        .unwrap()
}

/// Insert a bare user row for tests that exercise sessions directly.
pub async fn seed_user(pool: &SqlitePool, user_id: &str) {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO users (id, band_name, admin_email, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, 'x', ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(format!("band-{}", user_id))
    .bind(format!("{}@example.com", user_id))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();
}
