// src/config/server.rs
// Server, database, and infrastructure configuration

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL used when building links sent in outbound mail.
    pub public_base_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: super::helpers::env_or("ENCORE_HOST", "127.0.0.1"),
            port: super::helpers::env_u16("ENCORE_PORT", 8080),
            public_base_url: super::helpers::env_or(
                "ENCORE_PUBLIC_BASE_URL",
                "http://localhost:8080",
            ),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: super::helpers::env_or("DATABASE_URL", "sqlite://encore.db"),
            max_connections: super::helpers::env_u32("ENCORE_SQLITE_MAX_CONNECTIONS", 5),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: super::helpers::env_or("ENCORE_LOG_LEVEL", "info"),
        }
    }
}

/// Background task configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Interval between expiry sweeps (sessions past their TTL, stale
    /// refresh-token rows).
    pub sweep_interval_secs: u64,
}

impl TasksConfig {
    pub fn from_env() -> Self {
        Self {
            sweep_interval_secs: super::helpers::env_i64("ENCORE_SWEEP_INTERVAL_SECS", 600)
                .max(1) as u64,
        }
    }
}
