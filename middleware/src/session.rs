//! Request-scoped session handle
//!
//! Each request gets its own [`Session`] wrapping a private [`SessionData`]
//! copy. Clones of the handle share that copy; other requests never do,
//! even when they carry the same identifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sessiongate_core::session::with_timeout;
use sessiongate_core::{Payload, SessionData, SessionResult, SessionStoreRef, SessionValue};
use tracing::debug;

use crate::error::SessionRejection;

/// Handle to the current request's session
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    data: Mutex<SessionData>,
    store: SessionStoreRef,
    store_timeout: Option<Duration>,
    removed: AtomicBool,
}

impl Session {
    pub(crate) fn new(
        data: SessionData,
        store: SessionStoreRef,
        store_timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: Mutex::new(data),
                store,
                store_timeout,
                removed: AtomicBool::new(false),
            }),
        }
    }

    fn data(&self) -> MutexGuard<'_, SessionData> {
        // The container holds plain values, a panic mid-update cannot break it
        self.inner
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> String {
        self.data().id().to_string()
    }

    pub fn get(&self, key: &str) -> Option<SessionValue> {
        self.data().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<SessionValue>) {
        self.data().set(key, value);
    }

    pub fn delete(&self, key: &str) -> Option<SessionValue> {
        self.data().delete(key)
    }

    /// Snapshot of every key/value pair
    pub fn all(&self) -> Payload {
        self.data().all()
    }

    /// Discard pending local changes. The stored record is left alone
    /// until commit, which then deletes it since nothing is left.
    pub fn purge(&self) {
        self.data().purge();
    }

    /// Empty the payload
    pub fn clear(&self) {
        self.data().clear();
    }

    /// Log out: delete the stored record now and drop the local payload.
    ///
    /// Once the delete succeeds the middleware skips commit for this request
    /// and, in cookie mode, clears the client's cookie. Writes made after a
    /// successful `remove` are discarded. A failed delete leaves the session
    /// untouched.
    pub async fn remove(&self) -> SessionResult<()> {
        let id = self.id();

        match with_timeout(self.inner.store_timeout, self.inner.store.delete(&id)).await {
            Err(e) if !e.is_not_found() => return Err(e),
            _ => {}
        }

        self.data().purge();
        self.inner.removed.store(true, Ordering::SeqCst);
        debug!(session_id = %id, "Session removed");
        Ok(())
    }

    pub fn is_removed(&self) -> bool {
        self.inner.removed.load(Ordering::SeqCst)
    }

    pub(crate) fn snapshot(&self) -> SessionData {
        self.data().clone()
    }
}

/// Resolved identifier of the current request's session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionId(pub String);

/// Sessions attached to the request, keyed by each layer's `data_key`
#[derive(Clone, Debug, Default)]
pub struct Sessions(HashMap<String, Session>);

impl Sessions {
    pub fn get(&self, data_key: &str) -> Option<&Session> {
        self.0.get(data_key)
    }

    pub(crate) fn insert(&mut self, data_key: String, session: Session) {
        self.0.insert(data_key, session);
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = SessionRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(SessionRejection::MissingLayer)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SessionId {
    type Rejection = SessionRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionId>()
            .cloned()
            .ok_or(SessionRejection::MissingLayer)
    }
}
