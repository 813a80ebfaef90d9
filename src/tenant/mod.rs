// src/tenant/mod.rs
// Tenant-scoped transaction wrapper.
//
// Every tenant-scoped statement runs inside a transaction handed a TenantId
// as an explicit argument. The tenant is a parameter, not ambient state:
// there is no session-local variable for a call site to forget to set, and
// a query function that needs the tenant must take it.
//
// Timeout-class datastore errors are retried with exponential backoff
// (2s, 4s, 8s); any other error propagates on the first attempt.

use futures::future::BoxFuture;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::time::Duration;
use tracing::warn;

use crate::errors::{ApiError, ApiResult};

/// One isolated customer (band). Cheap to clone, passed by value into
/// transaction closures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const DEFAULT_TENANT_RETRIES: u32 = 3;

/// Run `op` inside a transaction scoped to `tenant`, with the default retry
/// budget for timeout-class errors.
pub async fn with_tenant<T, F>(pool: &SqlitePool, tenant: &TenantId, op: F) -> ApiResult<T>
where
    F: for<'c> Fn(&'c mut Transaction<'static, Sqlite>, TenantId) -> BoxFuture<'c, ApiResult<T>>,
{
    with_tenant_retries(pool, tenant, DEFAULT_TENANT_RETRIES, op).await
}

/// As `with_tenant`, with an explicit retry budget. `retries` counts extra
/// attempts after the first; attempt N waits 2^(N+1) seconds before running.
pub async fn with_tenant_retries<T, F>(
    pool: &SqlitePool,
    tenant: &TenantId,
    retries: u32,
    op: F,
) -> ApiResult<T>
where
    F: for<'c> Fn(&'c mut Transaction<'static, Sqlite>, TenantId) -> BoxFuture<'c, ApiResult<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        let mut tx = pool.begin().await?;

        match op(&mut tx, tenant.clone()).await {
            Ok(value) => {
                tx.commit().await?;
                return Ok(value);
            }
            Err(err) if err.is_timeout_class() && attempt < retries => {
                // Roll back by dropping the transaction, then back off.
                drop(tx);
                let delay = Duration::from_secs(2u64 << attempt);
                warn!(
                    tenant = %tenant,
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs(),
                    "tenant transaction timed out, retrying: {}",
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Convenience wrapper for timeout errors raised by callers' own logic
/// (e.g. statement deadlines) so they enter the retry path.
pub fn timeout_error(context: &str) -> ApiError {
    ApiError::transient(format!("transaction timeout: {}", context))
}
