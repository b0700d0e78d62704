// Framework-independent half of sessiongate:
// - Session policy configuration
// - Payload container and codec
// - Store adapter trait and adapters
// - Shared error and response envelope types

// Export config module - Session policy
pub mod config;
pub use config::{IdSource, SessionConfig};

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;

// Export envelope module - JSON response body
pub mod envelope;
pub use envelope::Envelope;

// Export session module - Payloads and stores
pub mod session;
pub use session::{
    InMemorySessionStore, Payload, SessionData, SessionStore, SessionStoreRef, SessionValue,
};
#[cfg(feature = "redis-store")]
pub use session::RedisSessionStore;
