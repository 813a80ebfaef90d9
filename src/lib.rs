// src/lib.rs

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod errors;
pub mod notify;
pub mod session;
pub mod state;
pub mod tasks;
pub mod tenant;

// Export commonly used items
pub use config::CONFIG;
pub use state::AppState;
