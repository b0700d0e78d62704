use axum::http::header::SET_COOKIE;
use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;
use cookie::Cookie;
use sessiongate_core::{IdSource, SessionConfig};
use time::OffsetDateTime;
use tracing::warn;

/// Hand the identifier back to the client for its next request.
///
/// After a removal the cookie is cleared and no header is sent.
pub(crate) fn write_back(res: &mut Response, config: &SessionConfig, id: &str, removed: bool) {
    match config.id_source {
        IdSource::Cookie => {
            let cookie = if removed {
                removal_cookie(config)
            } else {
                session_cookie(config, id)
            };
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    res.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => warn!(error = %e, "Session cookie is not a valid header value"),
            }
        }
        IdSource::Header => {
            if removed {
                return;
            }
            match (
                HeaderName::from_bytes(config.id_key.as_bytes()),
                HeaderValue::from_str(id),
            ) {
                (Ok(name), Ok(value)) => {
                    res.headers_mut().append(name, value);
                }
                _ => warn!(id_key = %config.id_key, "Cannot send session id as a header"),
            }
        }
    }
}

fn session_cookie(config: &SessionConfig, id: &str) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.id_key.clone(), id.to_string()))
        .path(config.cookie_path.clone())
        .http_only(true)
        .build();

    let expires = time::Duration::try_from(config.expiration)
        .ok()
        .and_then(|ttl| OffsetDateTime::now_utc().checked_add(ttl));
    match expires {
        Some(at) => cookie.set_expires(at),
        None => warn!(
            expiration = ?config.expiration,
            "Session expiration out of range, sending a browser-session cookie"
        ),
    }
    cookie
}

fn removal_cookie(config: &SessionConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.id_key.clone(), String::new()))
        .path(config.cookie_path.clone())
        .http_only(true)
        .build();
    cookie.make_removal();
    cookie
}
