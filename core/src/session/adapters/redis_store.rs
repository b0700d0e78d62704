use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use crate::errors::{SessionError, SessionResult};
use crate::session::store::SessionStore;

impl From<redis::RedisError> for SessionError {
    fn from(e: redis::RedisError) -> Self {
        SessionError::Storage(e.to_string())
    }
}

/// Redis-backed SessionStore. Records are plain string keys with `EX` expiry.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSessionStore").finish_non_exhaustive()
    }
}

impl RedisSessionStore {
    /// Connect to the server at `url` and verify it answers `PING`
    pub async fn connect(url: &str) -> SessionResult<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        info!("Connected to redis session store");
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, id: &str) -> SessionResult<Vec<u8>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(id).await?;
        value.ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn set(&self, id: &str, value: Vec<u8>, ttl: Duration) -> SessionResult<()> {
        let mut conn = self.conn.clone();
        // EX rejects 0, round sub-second ttls up
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(id, value, secs).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> SessionResult<()> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(id).await?;
        if removed == 0 {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
