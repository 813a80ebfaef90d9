// src/config/mod.rs
// Central configuration for the Encore backend

pub mod auth;
pub mod helpers;
pub mod server;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub static ref CONFIG: EncoreConfig = EncoreConfig::from_env();
}

/// Main configuration structure - composes all domain configs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoreConfig {
    pub server: server::ServerConfig,
    pub database: server::DatabaseConfig,
    pub logging: server::LoggingConfig,
    pub tasks: server::TasksConfig,
    pub auth: auth::AuthConfig,
}

impl EncoreConfig {
    pub fn from_env() -> Self {
        // Load .env file
        dotenv::dotenv().ok(); // Don't panic if .env doesn't exist (for production)

        Self {
            server: server::ServerConfig::from_env(),
            database: server::DatabaseConfig::from_env(),
            logging: server::LoggingConfig::from_env(),
            tasks: server::TasksConfig::from_env(),
            auth: auth::AuthConfig::from_env(),
        }
    }
}
