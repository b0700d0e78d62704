//! Session middleware
//!
//! Every request passes through the same sequence:
//! bypass check, identifier resolution, load, strict-auth gate, handler,
//! commit, and identifier write-back.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use sessiongate_core::session::with_timeout;
use sessiongate_core::{SessionConfig, SessionData, SessionResult, SessionStoreRef};
use tower::{Layer, Service};
use tracing::{debug, warn, Instrument};

use crate::error::SessionRejection;
use crate::resolver;
use crate::respond;
use crate::session::{Session, SessionId, Sessions};

/// Per-request test deciding whether to skip session handling
pub type SkipPredicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Immutable state shared by every request the layer serves
struct Manager {
    config: SessionConfig,
    store: Option<SessionStoreRef>,
    skip: Option<SkipPredicate>,
}

/// Tower layer installing the session middleware
#[derive(Clone)]
pub struct SessionLayer {
    manager: Arc<Manager>,
}

impl fmt::Debug for SessionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLayer")
            .field("config", &self.manager.config)
            .field("store", &self.manager.store)
            .field("skip", &self.manager.skip.is_some())
            .finish()
    }
}

impl SessionLayer {
    /// Layer with the given policy and no store. Until a store is attached,
    /// requests pass through untouched.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            manager: Arc::new(Manager {
                config: config.with_defaults(),
                store: None,
                skip: None,
            }),
        }
    }

    pub fn with_store(self, store: SessionStoreRef) -> Self {
        self.rebuild(|m| m.store = Some(store))
    }

    /// Bypass session handling for requests matching `predicate`
    pub fn skip_if<F>(self, predicate: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.rebuild(|m| m.skip = Some(Arc::new(predicate)))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.manager.config
    }

    fn rebuild(self, f: impl FnOnce(&mut Manager)) -> Self {
        let mut manager = Manager {
            config: self.manager.config.clone(),
            store: self.manager.store.clone(),
            skip: self.manager.skip.clone(),
        };
        f(&mut manager);
        Self {
            manager: Arc::new(manager),
        }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService {
            inner,
            manager: self.manager.clone(),
        }
    }
}

/// Service produced by [`SessionLayer`]
#[derive(Clone)]
pub struct SessionService<S> {
    inner: S,
    manager: Arc<Manager>,
}

impl<S> Service<Request> for SessionService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // Keep the instance that was polled ready
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let manager = self.manager.clone();

        Box::pin(async move { Ok(manager.handle(req, inner).await) })
    }
}

impl Manager {
    async fn handle<S>(&self, mut req: Request, mut inner: S) -> Response
    where
        S: Service<Request, Response = Response, Error = Infallible>,
    {
        let bypass = self.skip.as_ref().is_some_and(|skip| skip(&req));
        let store = match &self.store {
            Some(store) if !bypass => store.clone(),
            _ => return call(&mut inner, req).await,
        };

        let id = resolver::resolve(req.headers(), &self.config);
        let span = tracing::debug_span!("session", session_id = %id, data_key = %self.config.data_key);

        async move {
            let data = self.load(&store, &id).await;

            let strict = &self.config.strict_auth;
            if !strict.is_empty() && data.get(strict).is_none() {
                debug!(attribute = %strict, "Session lacks required attribute, rejecting");
                return SessionRejection::Unauthorized.into_response();
            }

            let session = Session::new(data, store.clone(), self.config.store_timeout);
            let extensions = req.extensions_mut();
            let mut sessions = extensions.remove::<Sessions>().unwrap_or_default();
            sessions.insert(self.config.data_key.clone(), session.clone());
            extensions.insert(sessions);
            extensions.insert(session.clone());
            extensions.insert(SessionId(id.clone()));

            let mut res = call(&mut inner, req).await;
            if res.status().is_server_error() {
                debug!(status = %res.status(), "Handler failed, session not committed");
                return res;
            }

            let removed = session.is_removed();
            if let Err(e) = self.commit(&store, &session).await {
                res = SessionRejection::Storage(e).into_response();
            }

            respond::write_back(&mut res, &self.config, &id, removed);
            res
        }
        .instrument(span)
        .await
    }

    /// Fetch the stored payload. Misses and store failures both give an empty session.
    async fn load(&self, store: &SessionStoreRef, id: &str) -> SessionData {
        match with_timeout(self.config.store_timeout, store.get(id)).await {
            Ok(bytes) => SessionData::from_bytes(id, Some(bytes.as_slice())),
            Err(e) if e.is_not_found() => {
                debug!("No stored session, starting empty");
                SessionData::new(id)
            }
            Err(e) => {
                warn!(error = %e, "Session load failed, starting empty");
                SessionData::new(id)
            }
        }
    }

    /// Persist the payload, or delete the record when nothing is left to remember
    async fn commit(&self, store: &SessionStoreRef, session: &Session) -> SessionResult<()> {
        if session.is_removed() {
            return Ok(());
        }

        let data = session.snapshot();
        let result = if data.is_empty() {
            with_timeout(self.config.store_timeout, store.delete(data.id())).await
        } else {
            let bytes = data.marshal()?;
            with_timeout(
                self.config.store_timeout,
                store.set(data.id(), bytes, self.config.expiration),
            )
            .await
        };

        match result {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

async fn call<S>(inner: &mut S, req: Request) -> Response
where
    S: Service<Request, Response = Response, Error = Infallible>,
{
    match inner.call(req).await {
        Ok(res) => res,
        Err(never) => match never {},
    }
}
