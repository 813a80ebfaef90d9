// src/notify/mod.rs
// Outbound mail seam. Real template rendering and provider throttling live
// in an external service; the auth core only needs a fire-and-forget send.

use async_trait::async_trait;
use tracing::info;

use crate::errors::ApiResult;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> ApiResult<()>;
}

/// Development mailer: logs instead of sending.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> ApiResult<()> {
        info!(to = %to, subject = %subject, body_len = body.len(), "outbound mail");
        Ok(())
    }
}
