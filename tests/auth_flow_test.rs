// tests/auth_flow_test.rs
// End-to-end authentication flows: registration, login, lockout, 2FA,
// refresh rotation with reuse detection, logout, password reset, and
// email verification.
//
// Run: cargo test --test auth_flow_test

mod common;

use common::{register_band, test_state, TEST_IP, TEST_UA};
use encore_backend::auth::signed_link::{generate_signed_token, LinkPayload, LinkPurpose};
use encore_backend::auth::{LoginOutcome, LoginRequest, TwoFactorRequest};
use encore_backend::errors::ApiError;
use sqlx::Row;

// =============================================================================
// Registration and login
// =============================================================================

#[tokio::test]
async fn test_register_then_login() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;

    assert!(!registered.tokens.access_token.is_empty());
    assert!(!registered.tokens.refresh_token.is_empty());
    assert!(registered.session.is_active);

    let outcome = state
        .auth_service
        .login(
            LoginRequest {
                admin_email: "band@example.com".to_string(),
                password: "correct horse battery".to_string(),
            },
            TEST_IP,
            TEST_UA,
        )
        .await
        .unwrap();

    let login = match outcome {
        LoginOutcome::LoggedIn(login) => login,
        LoginOutcome::TwoFactorRequired => panic!("2FA not enabled for this account"),
    };

    // Logging in ends the session minted at registration.
    assert_ne!(login.session.session_id, registered.session.session_id);
    let active = state
        .session_service
        .active_session_count(&login.user.id)
        .await
        .unwrap();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn test_login_wrong_password_fails() {
    let state = test_state().await;
    register_band(&state, "band@example.com").await;

    let err = state
        .auth_service
        .login(
            LoginRequest {
                admin_email: "band@example.com".to_string(),
                password: "not the password".to_string(),
            },
            TEST_IP,
            TEST_UA,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Authentication(_)));
}

#[tokio::test]
async fn test_login_unknown_email_fails() {
    let state = test_state().await;

    let err = state
        .auth_service
        .login(
            LoginRequest {
                admin_email: "nobody@example.com".to_string(),
                password: "whatever".to_string(),
            },
            TEST_IP,
            TEST_UA,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Authentication(_)));
}

#[tokio::test]
async fn test_lockout_after_repeated_failures() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;

    for _ in 0..5 {
        let err = state
            .auth_service
            .login(
                LoginRequest {
                    admin_email: "band@example.com".to_string(),
                    password: "wrong".to_string(),
                },
                TEST_IP,
                TEST_UA,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    let row = sqlx::query("SELECT locked_until FROM users WHERE id = ?")
        .bind(&registered.user.id)
        .fetch_one(&state.pool)
        .await
        .unwrap();
    let locked_until: Option<i64> = row.get("locked_until");
    assert!(locked_until.unwrap() > chrono::Utc::now().timestamp());

    // Correct password is rejected while the lock holds.
    let err = state
        .auth_service
        .login(
            LoginRequest {
                admin_email: "band@example.com".to_string(),
                password: "correct horse battery".to_string(),
            },
            TEST_IP,
            TEST_UA,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Authentication(_)));
}

#[tokio::test]
async fn test_login_enforces_single_active_session() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;

    for _ in 0..3 {
        state
            .auth_service
            .login(
                LoginRequest {
                    admin_email: "band@example.com".to_string(),
                    password: "correct horse battery".to_string(),
                },
                TEST_IP,
                TEST_UA,
            )
            .await
            .unwrap();
    }

    let active = state
        .session_service
        .active_session_count(&registered.user.id)
        .await
        .unwrap();
    assert_eq!(active, 1);
}

// =============================================================================
// Refresh rotation and reuse detection
// =============================================================================

#[tokio::test]
async fn test_refresh_rotates_token_pair() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;

    let rotated = state
        .token_service
        .refresh_access_token(Some(&registered.tokens.refresh_token), TEST_IP, TEST_UA)
        .await
        .unwrap();

    assert_eq!(rotated.user_id, registered.user.id);
    assert_eq!(rotated.session_id, registered.session.session_id);
    assert_ne!(rotated.pair.refresh_token, registered.tokens.refresh_token);

    // The rotated token works; the session survives the rotation.
    let session = state
        .session_service
        .get_current_session(&rotated.session_id, &rotated.user_id)
        .await
        .unwrap();
    assert!(session.is_some());
}

#[tokio::test]
async fn test_replayed_refresh_token_revokes_everything() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;
    let old_token = registered.tokens.refresh_token.clone();

    state
        .token_service
        .refresh_access_token(Some(&old_token), TEST_IP, TEST_UA)
        .await
        .unwrap();

    // Presenting the rotated-away token is treated as compromise.
    let err = state
        .token_service
        .refresh_access_token(Some(&old_token), TEST_IP, TEST_UA)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Authorization(_)));

    let active = state
        .session_service
        .active_session_count(&registered.user.id)
        .await
        .unwrap();
    assert_eq!(active, 0);

    let cached = state.refresh_tokens.get(&registered.user.id).await.unwrap();
    assert!(cached.is_none());
}

#[tokio::test]
async fn test_refresh_from_unknown_device_revokes_everything() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;

    let err = state
        .token_service
        .refresh_access_token(
            Some(&registered.tokens.refresh_token),
            "198.51.100.99",
            TEST_UA,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Authorization(_)));

    let active = state
        .session_service
        .active_session_count(&registered.user.id)
        .await
        .unwrap();
    assert_eq!(active, 0);
}

#[tokio::test]
async fn test_refresh_without_cookie_fails() {
    let state = test_state().await;

    let err = state
        .token_service
        .refresh_access_token(None, TEST_IP, TEST_UA)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Authentication(_)));
}

// =============================================================================
// Two-factor login
// =============================================================================

#[tokio::test]
async fn test_two_factor_login_flow() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;

    sqlx::query("UPDATE users SET two_factor_enabled = 1 WHERE id = ?")
        .bind(&registered.user.id)
        .execute(&state.pool)
        .await
        .unwrap();

    let outcome = state
        .auth_service
        .login(
            LoginRequest {
                admin_email: "band@example.com".to_string(),
                password: "correct horse battery".to_string(),
            },
            TEST_IP,
            TEST_UA,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::TwoFactorRequired));

    let row = sqlx::query("SELECT two_factor_code FROM users WHERE id = ?")
        .bind(&registered.user.id)
        .fetch_one(&state.pool)
        .await
        .unwrap();
    let code: Option<String> = row.get("two_factor_code");
    let code = code.expect("a 2FA code was stored");

    // Wrong code fails and leaves the challenge pending.
    let err = state
        .auth_service
        .verify_two_factor(
            TwoFactorRequest {
                admin_email: "band@example.com".to_string(),
                code: "000000".to_string(),
            },
            TEST_IP,
            TEST_UA,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Authentication(_)));

    let login = state
        .auth_service
        .verify_two_factor(
            TwoFactorRequest {
                admin_email: "band@example.com".to_string(),
                code,
            },
            TEST_IP,
            TEST_UA,
        )
        .await
        .unwrap();
    assert!(!login.tokens.access_token.is_empty());

    // The code is single-use.
    let row = sqlx::query("SELECT two_factor_code FROM users WHERE id = ?")
        .bind(&registered.user.id)
        .fetch_one(&state.pool)
        .await
        .unwrap();
    let cleared: Option<String> = row.get("two_factor_code");
    assert!(cleared.is_none());
}

// =============================================================================
// Logout
// =============================================================================

#[tokio::test]
async fn test_logout_ends_session_and_refresh_token() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;

    state
        .auth_service
        .logout(&registered.user.id, &registered.session.session_id)
        .await
        .unwrap();

    let session = state
        .session_service
        .get_current_session(&registered.session.session_id, &registered.user.id)
        .await
        .unwrap();
    assert!(session.is_none());

    // The refresh token died with the session.
    let err = state
        .token_service
        .refresh_access_token(Some(&registered.tokens.refresh_token), TEST_IP, TEST_UA)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

// =============================================================================
// Password reset
// =============================================================================

#[tokio::test]
async fn test_password_reset_flow() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;

    let payload = LinkPayload::new(&registered.user.id, LinkPurpose::PasswordReset, 3600);
    let token = generate_signed_token(&payload).unwrap();

    state
        .auth_service
        .confirm_password_reset(&token, "a brand new password")
        .await
        .unwrap();

    // The reset revoked every outstanding credential.
    let active = state
        .session_service
        .active_session_count(&registered.user.id)
        .await
        .unwrap();
    assert_eq!(active, 0);

    let err = state
        .auth_service
        .login(
            LoginRequest {
                admin_email: "band@example.com".to_string(),
                password: "correct horse battery".to_string(),
            },
            TEST_IP,
            TEST_UA,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Authentication(_)));

    let outcome = state
        .auth_service
        .login(
            LoginRequest {
                admin_email: "band@example.com".to_string(),
                password: "a brand new password".to_string(),
            },
            TEST_IP,
            TEST_UA,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::LoggedIn(_)));
}

#[tokio::test]
async fn test_password_reset_rejects_tampered_token() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;

    let payload = LinkPayload::new(&registered.user.id, LinkPurpose::PasswordReset, 3600);
    let mut token = generate_signed_token(&payload).unwrap();
    let last = token.pop().unwrap();
    token.push(if last == '0' { '1' } else { '0' });

    let err = state
        .auth_service
        .confirm_password_reset(&token, "a brand new password")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Authentication(_)));
}

#[tokio::test]
async fn test_password_reset_rejects_wrong_purpose() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;

    let payload = LinkPayload::new(&registered.user.id, LinkPurpose::VerifyEmail, 3600);
    let token = generate_signed_token(&payload).unwrap();

    let err = state
        .auth_service
        .confirm_password_reset(&token, "a brand new password")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Authentication(_)));
}

#[tokio::test]
async fn test_reset_request_does_not_reveal_unknown_emails() {
    let state = test_state().await;

    // Same observable outcome for unknown and known addresses.
    state
        .auth_service
        .request_password_reset("nobody@example.com")
        .await
        .unwrap();
}

// =============================================================================
// Email verification
// =============================================================================

#[tokio::test]
async fn test_verify_email_flow() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;
    assert!(!registered.user.verified);

    let payload = LinkPayload::new(&registered.user.id, LinkPurpose::VerifyEmail, 24 * 3600);
    let token = generate_signed_token(&payload).unwrap();

    state.auth_service.verify_email(&token).await.unwrap();

    let row = sqlx::query("SELECT verified FROM users WHERE id = ?")
        .bind(&registered.user.id)
        .fetch_one(&state.pool)
        .await
        .unwrap();
    let verified: bool = row.get("verified");
    assert!(verified);
}

#[tokio::test]
async fn test_verify_email_rejects_expired_link() {
    let state = test_state().await;
    let registered = register_band(&state, "band@example.com").await;

    // TTL of -1 second: already expired when minted.
    let payload = LinkPayload::new(&registered.user.id, LinkPurpose::VerifyEmail, -1);
    let token = generate_signed_token(&payload).unwrap();

    let err = state.auth_service.verify_email(&token).await.unwrap_err();
    assert!(matches!(err, ApiError::Authentication(_)));
}
