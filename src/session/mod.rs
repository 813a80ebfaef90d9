// src/session/mod.rs

pub mod service;

pub use service::{Session, SessionService};
