//! Session payloads and the stores that hold them
//!
//! A session is an opaque identifier plus a small key/value payload. The
//! payload lives in a [`SessionStore`] between requests; [`SessionData`] is
//! the transient per-request copy handlers read and mutate.

pub mod adapters;
pub mod data;
pub mod store;
pub mod value;

pub use adapters::InMemorySessionStore;
#[cfg(feature = "redis-store")]
pub use adapters::RedisSessionStore;
pub use data::{Payload, SessionData};
pub use store::{with_timeout, SessionStore, SessionStoreRef};
pub use value::SessionValue;
