// src/api/http/mod.rs

pub mod account;
pub mod auth;
pub mod cookies;
pub mod health;

pub use account::create_account_router;
pub use auth::create_auth_router;
pub use health::{health_check, liveness_check, readiness_check};
