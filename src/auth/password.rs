// src/auth/password.rs

use bcrypt::{hash, verify, BcryptError, DEFAULT_COST};

use crate::errors::{ApiError, ApiResult};

pub fn hash_password(password: &str) -> ApiResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e: BcryptError| ApiError::internal(format!("failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> ApiResult<bool> {
    verify(password, hash)
        .map_err(|e: BcryptError| ApiError::internal(format!("failed to verify password: {}", e)))
}
