// src/auth/signed_link.rs
// One-shot signed tokens for email links (verification, password reset).
//
// Deliberately not JWT: base64url(JSON payload) + "." + hex(HMAC-SHA256).
// Verification fails closed - any decode, signature, or expiry problem
// yields None rather than an error the caller might mishandle.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::CONFIG;
use crate::errors::ApiResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkPurpose {
    #[serde(rename = "verify_email")]
    VerifyEmail,
    #[serde(rename = "password_reset")]
    PasswordReset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkPayload {
    pub user_id: String,
    pub purpose: LinkPurpose,
    pub expires_at: i64,
}

impl LinkPayload {
    pub fn new(user_id: impl Into<String>, purpose: LinkPurpose, ttl_secs: i64) -> Self {
        Self {
            user_id: user_id.into(),
            purpose,
            expires_at: chrono::Utc::now().timestamp() + ttl_secs,
        }
    }
}

pub fn generate_signed_token(payload: &LinkPayload) -> ApiResult<String> {
    let json = serde_json::to_vec(payload)?;
    let body = URL_SAFE_NO_PAD.encode(&json);
    let sig = hex::encode(hmac_sha256(
        CONFIG.auth.link_token_secret.as_bytes(),
        body.as_bytes(),
    ));
    Ok(format!("{}.{}", body, sig))
}

/// Returns None unless the signature matches and the payload is unexpired.
pub fn verify_signed_token(token: &str) -> Option<LinkPayload> {
    let (body, sig) = token.split_once('.')?;
    let expected = hex::encode(hmac_sha256(
        CONFIG.auth.link_token_secret.as_bytes(),
        body.as_bytes(),
    ));
    if !constant_time_eq(sig.as_bytes(), expected.as_bytes()) {
        return None;
    }

    let json = URL_SAFE_NO_PAD.decode(body).ok()?;
    let payload: LinkPayload = serde_json::from_slice(&json).ok()?;
    if payload.expires_at <= chrono::Utc::now().timestamp() {
        return None;
    }
    Some(payload)
}

/// HMAC-SHA256 (RFC 2104) over the sha2 digest. Key longer than the 64-byte
/// block is hashed first.
fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    const BLOCK_SIZE: usize = 64;

    let mut key_block = [0u8; BLOCK_SIZE];
    if key.len() > BLOCK_SIZE {
        let digest = Sha256::digest(key);
        key_block[..digest.len()].copy_from_slice(&digest);
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let mut inner = Sha256::new();
    for byte in key_block.iter() {
        inner.update([*byte ^ 0x36]);
    }
    inner.update(message);
    let inner_hash = inner.finalize();

    let mut outer = Sha256::new();
    for byte in key_block.iter() {
        outer.update([*byte ^ 0x5c]);
    }
    outer.update(inner_hash);
    outer.finalize().into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_matches_rfc_4231_test_case_2() {
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn round_trip() {
        let payload = LinkPayload::new("user_1", LinkPurpose::PasswordReset, 3600);
        let token = generate_signed_token(&payload).unwrap();
        let verified = verify_signed_token(&token).unwrap();
        assert_eq!(verified, payload);
    }

    #[test]
    fn expired_payload_fails_despite_valid_signature() {
        let payload = LinkPayload {
            user_id: "user_1".to_string(),
            purpose: LinkPurpose::VerifyEmail,
            expires_at: chrono::Utc::now().timestamp() - 1,
        };
        let token = generate_signed_token(&payload).unwrap();
        assert!(verify_signed_token(&token).is_none());
    }

    #[test]
    fn single_byte_tamper_fails() {
        let payload = LinkPayload::new("user_1", LinkPurpose::VerifyEmail, 3600);
        let token = generate_signed_token(&payload).unwrap();
        let mut bytes = token.into_bytes();
        bytes[0] = if bytes[0] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(verify_signed_token(&tampered).is_none());
    }

    #[test]
    fn malformed_tokens_fail_closed() {
        assert!(verify_signed_token("").is_none());
        assert!(verify_signed_token("no-separator").is_none());
        assert!(verify_signed_token("body.badsig").is_none());
    }
}
