// src/api/http/cookies.rs
// Auth cookie contract: access_token and refresh_token, HttpOnly,
// SameSite=Strict, 1-hour max-age; Secure and Domain pinned in production.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};

use crate::auth::TokenPair;
use crate::config::CONFIG;
use crate::errors::{ApiError, ApiResult};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

const COOKIE_MAX_AGE_SECS: i64 = 3600;

/// Pull one cookie value out of the Cookie header.
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

fn build_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        name, value, max_age_secs
    );
    if CONFIG.auth.production {
        cookie.push_str("; Secure");
        if let Some(domain) = &CONFIG.auth.cookie_domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
    }
    cookie
}

fn append_set_cookie(headers: &mut HeaderMap, cookie: &str) -> ApiResult<()> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| ApiError::internal(format!("invalid cookie header: {}", e)))?;
    headers.append(SET_COOKIE, value);
    Ok(())
}

pub fn set_auth_cookies(headers: &mut HeaderMap, pair: &TokenPair) -> ApiResult<()> {
    append_set_cookie(
        headers,
        &build_cookie(ACCESS_COOKIE, &pair.access_token, COOKIE_MAX_AGE_SECS),
    )?;
    append_set_cookie(
        headers,
        &build_cookie(REFRESH_COOKIE, &pair.refresh_token, COOKIE_MAX_AGE_SECS),
    )
}

pub fn clear_auth_cookies(headers: &mut HeaderMap) -> ApiResult<()> {
    append_set_cookie(headers, &build_cookie(ACCESS_COOKIE, "", 0))?;
    append_set_cookie(headers, &build_cookie(REFRESH_COOKIE, "", 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("access_token=abc; refresh_token=def"),
        );
        assert_eq!(get_cookie(&headers, ACCESS_COOKIE).as_deref(), Some("abc"));
        assert_eq!(get_cookie(&headers, REFRESH_COOKIE).as_deref(), Some("def"));
        assert_eq!(get_cookie(&headers, "other"), None);
    }

    #[test]
    fn get_cookie_handles_missing_header() {
        let headers = HeaderMap::new();
        assert_eq!(get_cookie(&headers, ACCESS_COOKIE), None);
    }

    #[test]
    fn cookies_carry_required_attributes() {
        let cookie = build_cookie(ACCESS_COOKIE, "tok", COOKIE_MAX_AGE_SECS);
        assert!(cookie.starts_with("access_token=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=3600"));
    }
}
