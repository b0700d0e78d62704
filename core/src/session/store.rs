use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{SessionError, SessionResult};

/// Trait defining the interface for session stores.
///
/// Records are opaque bytes keyed by session identifier. A missing record is
/// reported as [`SessionError::NotFound`] from both `get` and `delete`.
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Fetch the serialized payload for an identifier
    async fn get(&self, id: &str) -> SessionResult<Vec<u8>>;

    /// Write a payload, replacing any existing record, expiring after `ttl`
    async fn set(&self, id: &str, value: Vec<u8>, ttl: Duration) -> SessionResult<()>;

    /// Delete the record for an identifier
    async fn delete(&self, id: &str) -> SessionResult<()>;
}

/// Type alias for Arc-wrapped SessionStore trait objects
pub type SessionStoreRef = Arc<dyn SessionStore>;

/// Run a store call, failing with [`SessionError::Timeout`] if it outlives `limit`.
pub async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> SessionResult<T>
where
    F: Future<Output = SessionResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SessionError::Timeout(limit))?,
        None => fut.await,
    }
}
