//! Per-request session middleware for axum/tower
//!
//! [`SessionLayer`] resolves the client's session identifier, loads the
//! payload from a [`SessionStore`](sessiongate_core::SessionStore), exposes
//! it to handlers as a [`Session`], and commits changes when the handler
//! returns.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use axum::{routing::post, Router};
//! use sessiongate_core::{InMemorySessionStore, SessionConfig};
//! use sessiongate_middleware::{Session, SessionLayer};
//!
//! async fn login(session: Session) -> &'static str {
//!     session.set("user", "42");
//!     "ok"
//! }
//!
//! let layer = SessionLayer::new(SessionConfig::default())
//!     .with_store(Arc::new(InMemorySessionStore::new()));
//! let app: Router = Router::new().route("/login", post(login)).layer(layer);
//! ```

pub mod error;
pub mod layer;
pub mod resolver;
mod respond;
pub mod session;

pub use error::SessionRejection;
pub use layer::{SessionLayer, SessionService, SkipPredicate};
pub use session::{Session, SessionId, Sessions};
