use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Router};
use cookie::Cookie;
use sessiongate_core::envelope::{Envelope, CODE_AUTH_FAILED, CODE_STORAGE_FAILED};
use sessiongate_core::{
    IdSource, InMemorySessionStore, SessionConfig, SessionError, SessionResult, SessionStore,
    SessionValue,
};
use sessiongate_middleware::{Session, SessionId, SessionLayer, SessionRejection, Sessions};
use time::OffsetDateTime;
use tower::ServiceExt;

/// In-memory store that counts writes and can be told to fail or stall
#[derive(Debug, Default)]
struct ScriptedStore {
    inner: InMemorySessionStore,
    fail_get: bool,
    fail_set: bool,
    fail_delete: bool,
    stall_set: Option<Duration>,
    sets: AtomicUsize,
    deletes: AtomicUsize,
    last_ttl: Mutex<Option<Duration>>,
}

#[async_trait]
impl SessionStore for ScriptedStore {
    async fn get(&self, id: &str) -> SessionResult<Vec<u8>> {
        if self.fail_get {
            return Err(SessionError::Storage("connection refused".into()));
        }
        self.inner.get(id).await
    }

    async fn set(&self, id: &str, value: Vec<u8>, ttl: Duration) -> SessionResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        *self.last_ttl.lock().unwrap() = Some(ttl);
        if let Some(stall) = self.stall_set {
            tokio::time::sleep(stall).await;
        }
        if self.fail_set {
            return Err(SessionError::Storage("read-only replica".into()));
        }
        self.inner.set(id, value, ttl).await
    }

    async fn delete(&self, id: &str) -> SessionResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete {
            return Err(SessionError::Storage("connection reset".into()));
        }
        self.inner.delete(id).await
    }
}

async fn login(session: Session) -> &'static str {
    session.set("user", "42");
    "ok"
}

async fn whoami(session: Session) -> String {
    session
        .get("user")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

async fn logout(session: Session) -> Result<&'static str, SessionRejection> {
    session.remove().await?;
    Ok("bye")
}

async fn logout_then_write(session: Session) -> &'static str {
    let _ = session.remove().await;
    session.set("user", "late");
    "bye"
}

async fn purge(session: Session) -> &'static str {
    session.purge();
    "purged"
}

async fn nan(session: Session) -> &'static str {
    session.set("ratio", f64::NAN);
    "ok"
}

async fn boom(session: Session) -> StatusCode {
    session.set("user", "mallory");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn ids(
    session: Session,
    SessionId(id): SessionId,
    Extension(sessions): Extension<Sessions>,
) -> String {
    assert_eq!(session.id(), id);
    let named = sessions
        .get("session_data")
        .expect("session registered under data_key");
    assert_eq!(named.id(), id);
    id
}

fn app(layer: SessionLayer) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/whoami", get(whoami))
        .route("/logout", post(logout))
        .route("/logout-then-write", post(logout_then_write))
        .route("/purge", post(purge))
        .route("/nan", post(nan))
        .route("/boom", get(boom))
        .route("/ids", get(ids))
        .route("/health", get(|| async { "up" }))
        .layer(layer)
}

fn cookie_layer(store: Arc<dyn SessionStore>) -> SessionLayer {
    SessionLayer::new(
        SessionConfig::default()
            .with_id_key("session_id")
            .with_expiration(Duration::from_secs(3600)),
    )
    .with_store(store)
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_req(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn with_cookie(mut req: Request<Body>, id: &str) -> Request<Body> {
    req.headers_mut()
        .insert(COOKIE, format!("session_id={}", id).parse().unwrap());
    req
}

fn session_cookie(res: &Response) -> Option<Cookie<'static>> {
    res.headers()
        .get(SET_COOKIE)
        .map(|v| Cookie::parse(v.to_str().unwrap().to_string()).unwrap())
}

async fn body_string(res: Response) -> String {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_envelope(res: Response) -> Envelope {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn cookie_mode_new_session_is_persisted() {
    let store = InMemorySessionStore::new();
    let app = app(cookie_layer(Arc::new(store.clone())));

    let res = app.oneshot(post_req("/login")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let cookie = session_cookie(&res).expect("response sets session cookie");
    assert_eq!(cookie.name(), "session_id");
    assert!(cookie.value().starts_with("sess_"));

    let ahead = (cookie.expires_datetime().unwrap() - OffsetDateTime::now_utc()).whole_seconds();
    assert!((3590..=3600).contains(&ahead));

    let stored = store.get(cookie.value()).await.unwrap();
    assert_eq!(stored, br#"{"user":"42"}"#.to_vec());
}

#[tokio::test]
async fn cookie_mode_session_is_loaded_on_next_request() {
    let store = InMemorySessionStore::new();
    let app = app(cookie_layer(Arc::new(store.clone())));

    let res = app.clone().oneshot(post_req("/login")).await.unwrap();
    let id = session_cookie(&res).unwrap().value().to_string();

    let res = app.oneshot(with_cookie(get_req("/whoami"), &id)).await.unwrap();
    assert_eq!(session_cookie(&res).unwrap().value(), id);
    assert_eq!(body_string(res).await, "42");
}

#[tokio::test]
async fn header_mode_uses_bearer_token_verbatim() {
    let store = InMemorySessionStore::new();
    let layer = SessionLayer::new(
        SessionConfig::default()
            .with_id_source(IdSource::Header)
            .with_id_key("X-Session")
            .with_expiration(Duration::from_secs(3600)),
    )
    .with_store(Arc::new(store.clone()));

    let req = Request::builder()
        .method("POST")
        .uri("/login")
        .header(AUTHORIZATION, "Bearer abc123")
        .body(Body::empty())
        .unwrap();
    let res = app(layer).oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("x-session").unwrap(), "abc123");
    assert!(res.headers().get(SET_COOKIE).is_none());
    assert_eq!(store.get("abc123").await.unwrap(), br#"{"user":"42"}"#.to_vec());
}

#[tokio::test]
async fn strict_gate_rejects_without_attribute() {
    let store = Arc::new(ScriptedStore::default());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let app = Router::new()
        .route(
            "/account",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "secret"
                }
            }),
        )
        .layer(
            SessionLayer::new(SessionConfig::default().with_strict_auth("user"))
                .with_store(store.clone()),
        );

    let res = app.oneshot(get_req("/account")).await.unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&res).is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(store.sets.load(Ordering::SeqCst), 0);
    assert_eq!(store.deletes.load(Ordering::SeqCst), 0);

    let envelope = body_envelope(res).await;
    assert_eq!(envelope.code, CODE_AUTH_FAILED);
    assert_eq!(envelope.status, 401);
}

#[tokio::test]
async fn strict_gate_admits_session_with_attribute() {
    let store = InMemorySessionStore::new();
    store
        .set("sess_known", br#"{"user":"42"}"#.to_vec(), Duration::from_secs(60))
        .await
        .unwrap();

    let layer = SessionLayer::new(SessionConfig::default().with_strict_auth("user"))
        .with_store(Arc::new(store.clone()));
    let res = app(layer)
        .oneshot(with_cookie(get_req("/whoami"), "sess_known"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, "42");
}

#[tokio::test]
async fn empty_payload_deletes_record() {
    let store = InMemorySessionStore::new();
    store
        .set("sess_old", br#"{"user":"42"}"#.to_vec(), Duration::from_secs(60))
        .await
        .unwrap();
    let app = app(cookie_layer(Arc::new(store.clone())));

    let res = app
        .clone()
        .oneshot(with_cookie(post_req("/purge"), "sess_old"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(store.get("sess_old").await.unwrap_err().is_not_found());

    // Untouched new session: delete of a missing record is not an error
    let res = app.oneshot(get_req("/whoami")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(session_cookie(&res).is_some());
    assert!(store.is_empty());
}

#[tokio::test]
async fn remove_deletes_record_and_clears_cookie() {
    let store = InMemorySessionStore::new();
    store
        .set("sess_bye", br#"{"user":"42"}"#.to_vec(), Duration::from_secs(60))
        .await
        .unwrap();
    let app = app(cookie_layer(Arc::new(store.clone())));

    let res = app
        .oneshot(with_cookie(post_req("/logout"), "sess_bye"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let cookie = session_cookie(&res).unwrap();
    assert_eq!(cookie.name(), "session_id");
    assert_eq!(cookie.value(), "");
    assert!(cookie.expires_datetime().unwrap() < OffsetDateTime::now_utc());
    assert!(store.get("sess_bye").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn writes_after_remove_are_discarded() {
    let store = Arc::new(ScriptedStore::default());
    store
        .inner
        .set("sess_gone", br#"{"user":"42"}"#.to_vec(), Duration::from_secs(60))
        .await
        .unwrap();
    let app = app(cookie_layer(store.clone()));

    let res = app
        .oneshot(with_cookie(post_req("/logout-then-write"), "sess_gone"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(session_cookie(&res).unwrap().value(), "");
    assert_eq!(store.sets.load(Ordering::SeqCst), 0);
    assert!(store.inner.get("sess_gone").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn failed_remove_keeps_session_alive() {
    let store = Arc::new(ScriptedStore {
        fail_delete: true,
        ..Default::default()
    });
    store
        .inner
        .set("sess_stuck", br#"{"user":"42"}"#.to_vec(), Duration::from_secs(60))
        .await
        .unwrap();
    let app = app(cookie_layer(store.clone()));

    let res = app
        .oneshot(with_cookie(post_req("/logout-then-write"), "sess_stuck"))
        .await
        .unwrap();

    // The cookie still points at the record the store failed to delete
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(session_cookie(&res).unwrap().value(), "sess_stuck");
    let stored = store.inner.get("sess_stuck").await.unwrap();
    assert_eq!(stored, br#"{"user":"late"}"#.to_vec());
}

#[tokio::test]
async fn commit_passes_configured_ttl_to_store() {
    let store = Arc::new(ScriptedStore::default());
    let layer = SessionLayer::new(
        SessionConfig::default().with_expiration(Duration::from_secs(120)),
    )
    .with_store(store.clone());

    let res = app(layer).oneshot(post_req("/login")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(store.sets.load(Ordering::SeqCst), 1);
    assert_eq!(
        *store.last_ttl.lock().unwrap(),
        Some(Duration::from_secs(120))
    );
}

#[tokio::test]
async fn out_of_range_expiration_fails_without_panicking() {
    let store = InMemorySessionStore::new();
    let layer = SessionLayer::new(
        SessionConfig::default().with_expiration(Duration::from_secs(10_000_000_000_000)),
    )
    .with_store(Arc::new(store.clone()));

    let res = app(layer).oneshot(post_req("/login")).await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let cookie = session_cookie(&res).expect("identifier still sent");
    assert!(cookie.expires().is_none());
    assert!(store.is_empty());
}

#[tokio::test]
async fn load_failure_is_absorbed() {
    let store = Arc::new(ScriptedStore {
        fail_get: true,
        ..Default::default()
    });
    let app = app(cookie_layer(store.clone()));

    let res = app.oneshot(post_req("/login")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(store.sets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn commit_failure_is_propagated_with_identifier() {
    let store = Arc::new(ScriptedStore {
        fail_set: true,
        ..Default::default()
    });
    let app = app(cookie_layer(store));

    let res = app.oneshot(post_req("/login")).await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(session_cookie(&res).is_some());
    assert_eq!(body_envelope(res).await.code, CODE_STORAGE_FAILED);
}

#[tokio::test]
async fn commit_timeout_fails_the_request() {
    let store = Arc::new(ScriptedStore {
        stall_set: Some(Duration::from_secs(5)),
        ..Default::default()
    });
    let layer = SessionLayer::new(
        SessionConfig::default().with_store_timeout(Duration::from_millis(20)),
    )
    .with_store(store);

    let res = app(layer).oneshot(post_req("/login")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn unserializable_payload_fails_the_request() {
    let store = InMemorySessionStore::new();
    let app = app(cookie_layer(Arc::new(store.clone())));

    let res = app.oneshot(post_req("/nan")).await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(store.is_empty());
}

#[tokio::test]
async fn handler_failure_skips_commit() {
    let store = Arc::new(ScriptedStore::default());
    let app = app(cookie_layer(store.clone()));

    let res = app.oneshot(get_req("/boom")).await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(session_cookie(&res).is_none());
    assert_eq!(store.sets.load(Ordering::SeqCst), 0);
    assert_eq!(store.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn skip_predicate_bypasses_sessions() {
    let store = Arc::new(ScriptedStore::default());
    let layer = cookie_layer(store.clone()).skip_if(|req| req.uri().path() == "/health");
    let app = app(layer);

    let res = app.clone().oneshot(get_req("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(session_cookie(&res).is_none());
    assert_eq!(store.deletes.load(Ordering::SeqCst), 0);

    // Extractors report the missing session instead of panicking
    let layer = cookie_layer(store.clone()).skip_if(|_| true);
    let res = self::app(layer).oneshot(get_req("/whoami")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn no_store_means_no_sessions() {
    let app = app(SessionLayer::new(SessionConfig::default()));

    let res = app.clone().oneshot(get_req("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(session_cookie(&res).is_none());
}

#[tokio::test]
async fn handlers_see_id_and_named_session() {
    let store = InMemorySessionStore::new();
    let app = app(cookie_layer(Arc::new(store)));

    let res = app
        .oneshot(with_cookie(get_req("/ids"), "sess_named"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, "sess_named");
}

#[tokio::test]
async fn concurrent_requests_get_separate_containers() {
    let store = InMemorySessionStore::new();
    store
        .set("sess_shared", br#"{"n":0}"#.to_vec(), Duration::from_secs(60))
        .await
        .unwrap();

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let app = Router::new()
        .route(
            "/bump",
            post(move |session: Session| {
                let counter = counter.clone();
                let barrier = barrier.clone();
                async move {
                    let n = session.get("n").and_then(|v| v.as_i64()).unwrap_or(-1);
                    // Each request starts from the stored value, never another request's edit
                    if n == 0 {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                    session.set("n", n + 1);
                    // Hold both requests until each has loaded and mutated its own copy
                    barrier.wait().await;
                    "ok"
                }
            }),
        )
        .layer(cookie_layer(Arc::new(store.clone())));

    let first = app
        .clone()
        .oneshot(with_cookie(post_req("/bump"), "sess_shared"));
    let second = app.oneshot(with_cookie(post_req("/bump"), "sess_shared"));
    let (a, b) = tokio::join!(first, second);
    assert_eq!(a.unwrap().status(), StatusCode::OK);
    assert_eq!(b.unwrap().status(), StatusCode::OK);

    assert_eq!(seen.load(Ordering::SeqCst), 2);
    let bytes = store.get("sess_shared").await.unwrap();
    let stored = sessiongate_core::SessionData::from_bytes("sess_shared", Some(bytes.as_slice()));
    assert_eq!(stored.get("n"), Some(&SessionValue::Int(1)));
}
