use std::collections::HashMap;

use tracing::debug;

use crate::errors::SessionResult;
use crate::session::value::SessionValue;

/// Mapping from session keys to values
pub type Payload = HashMap<String, SessionValue>;

/// Per-request copy of a session payload.
///
/// The backing map stays unallocated until the first write, so a session
/// that was never touched can be told apart from one that was loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    id: String,
    data: Option<Payload>,
}

impl SessionData {
    /// Create an empty container for the given identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: None,
        }
    }

    /// Build a container from stored bytes.
    ///
    /// Missing or undecodable bytes give a brand-new, unallocated session.
    pub fn from_bytes(id: impl Into<String>, src: Option<&[u8]>) -> Self {
        let id = id.into();
        let data = src.and_then(|bytes| match serde_json::from_slice::<Payload>(bytes) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(session_id = %id, error = %e, "Discarding undecodable session payload");
                None
            }
        });

        Self { id, data }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&SessionValue> {
        self.data.as_ref().and_then(|d| d.get(key))
    }

    /// Set a value, allocating the payload on first use
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SessionValue>) {
        self.data
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
    }

    /// Remove a single key, returning its previous value
    pub fn delete(&mut self, key: &str) -> Option<SessionValue> {
        self.data.as_mut().and_then(|d| d.remove(key))
    }

    /// Snapshot of the current payload
    pub fn all(&self) -> Payload {
        self.data.clone().unwrap_or_default()
    }

    /// Serialize the current payload.
    ///
    /// An unallocated payload encodes as an empty map.
    pub fn marshal(&self) -> SessionResult<Vec<u8>> {
        let bytes = match &self.data {
            Some(d) => serde_json::to_vec(d)?,
            None => serde_json::to_vec(&Payload::new())?,
        };
        Ok(bytes)
    }

    /// Drop the in-memory payload. The store is not touched.
    pub fn purge(&mut self) {
        self.data = None;
    }

    /// Empty the payload while keeping it allocated
    pub fn clear(&mut self) {
        if let Some(d) = self.data.as_mut() {
            d.clear();
        } else {
            self.data = Some(HashMap::new());
        }
    }

    /// True once the payload was loaded or written
    pub fn is_allocated(&self) -> bool {
        self.data.is_some()
    }

    /// True if there is nothing worth persisting
    pub fn is_empty(&self) -> bool {
        self.data.as_ref().map_or(true, |d| d.is_empty())
    }
}
