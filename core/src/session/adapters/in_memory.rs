use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::{SessionError, SessionResult};
use crate::session::store::SessionStore;

#[derive(Debug, Clone)]
struct Record {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

impl Record {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// In-memory implementation of SessionStore
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    /// Thread-safe storage of session records
    records: Arc<RwLock<HashMap<String, Record>>>,
}

impl InMemorySessionStore {
    /// Create a new InMemorySessionStore
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) records
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.records
            .read()
            .map(|r| r.values().filter(|rec| !rec.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired record, returning how many were removed
    pub fn cleanup_expired_sessions(&self) -> SessionResult<usize> {
        let mut records = self.records.write().map_err(|e| {
            SessionError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let now = Utc::now();
        let before = records.len();
        records.retain(|_, rec| !rec.is_expired(now));
        let count = before - records.len();

        if count > 0 {
            debug!(count, "Cleaned up expired sessions");
        }
        Ok(count)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &str) -> SessionResult<Vec<u8>> {
        let records = self.records.read().map_err(|e| {
            SessionError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        match records.get(id) {
            Some(rec) if !rec.is_expired(Utc::now()) => Ok(rec.value.clone()),
            _ => Err(SessionError::NotFound(id.to_string())),
        }
    }

    async fn set(&self, id: &str, value: Vec<u8>, ttl: Duration) -> SessionResult<()> {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| SessionError::Storage(format!("ttl {:?} is out of range", ttl)))?;

        let mut records = self.records.write().map_err(|e| {
            SessionError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        records.insert(
            id.to_string(),
            Record {
                value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> SessionResult<()> {
        let mut records = self.records.write().map_err(|e| {
            SessionError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        match records.remove(id) {
            Some(rec) if !rec.is_expired(Utc::now()) => {
                debug!(session_id = %id, "Deleted session");
                Ok(())
            }
            _ => Err(SessionError::NotFound(id.to_string())),
        }
    }
}
