// src/auth/mod.rs

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;
pub mod signed_link;
pub mod tokens;

pub use jwt::{Role, TokenClaims, TokenIdentity};
pub use middleware::{require_auth, AuthUser};
pub use service::{
    AuthService, AuthenticatedLogin, LoginOutcome, LoginRequest, PublicUser, RegisterRequest,
    TwoFactorRequest,
};
pub use tokens::{RotatedTokens, TokenPair, TokenService};
