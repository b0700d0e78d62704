use crate::config::AppConfig;
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sessiongate_core::{Envelope, SessionStoreRef};
use sessiongate_middleware::{Session, SessionLayer, SessionRejection};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Request model for login
#[derive(Deserialize)]
pub struct LoginRequest {
    user: String,
}

/// Build the application router.
///
/// Public routes share a plain session layer; `/account` routes get their
/// own layer that refuses sessions without the account attribute.
pub fn build_app(config: &AppConfig, store: SessionStoreRef) -> Router {
    let session_layer = SessionLayer::new(config.session.clone())
        .with_store(store.clone())
        .skip_if(|req| req.uri().path() == "/");

    let account_layer = SessionLayer::new(
        config
            .session
            .clone()
            .with_strict_auth(config.account_attribute.clone()),
    )
    .with_store(store);

    let public_routes = Router::new()
        .route("/", get(health))
        .route("/login", post(login))
        .route("/session", get(show_session))
        .route("/logout", post(logout))
        .layer(session_layer);

    let account_routes = Router::new()
        .route("/account/me", get(me))
        .layer(account_layer);

    public_routes
        .merge(account_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
}

/// Start the HTTP server
pub async fn run_server(config: AppConfig, store: SessionStoreRef) -> anyhow::Result<()> {
    let addr = config.http_addr;
    info!("Starting HTTP server on {}", addr);

    let app = build_app(&config, store);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

/// Health check handler
async fn health() -> impl IntoResponse {
    "sessiongate is running"
}

async fn login(session: Session, Json(payload): Json<LoginRequest>) -> impl IntoResponse {
    if payload.user.is_empty() {
        let body = Envelope::wrap(None)
            .with_status(400)
            .with_code(sessiongate_core::envelope::CODE_GENERAL_FAILED)
            .with_message("user must not be empty");
        return (StatusCode::BAD_REQUEST, Json(body));
    }

    session.set("user", payload.user);
    (
        StatusCode::OK,
        Json(Envelope::wrap(Some(json!({ "session_id": session.id() })))),
    )
}

async fn show_session(session: Session) -> Json<Envelope> {
    let data = serde_json::to_value(session.all()).unwrap_or_default();
    Json(Envelope::wrap(Some(data)))
}

async fn logout(session: Session) -> Result<Json<Envelope>, SessionRejection> {
    session.remove().await?;
    Ok(Json(Envelope::wrap(None)))
}

async fn me(session: Session) -> Json<Envelope> {
    let user = session
        .get("user")
        .and_then(|v| v.as_str().map(str::to_string));
    Json(Envelope::wrap(Some(json!({ "user": user }))))
}
