use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use cookie::Cookie;
use sessiongate_core::{IdSource, SessionConfig};
use uuid::Uuid;

/// Resolve the session identifier for a request.
///
/// Always returns a non-empty identifier: when the client supplies none, a
/// fresh `id_prefix` + UUIDv4 is generated.
pub fn resolve(headers: &HeaderMap, config: &SessionConfig) -> String {
    let supplied = match config.id_source {
        IdSource::Cookie => from_cookie(headers, &config.id_key),
        IdSource::Header => from_header(headers, &config.id_key),
    };

    match supplied {
        Some(id) if !id.is_empty() => id,
        _ => generate(&config.id_prefix),
    }
}

/// A new unpredictable identifier
pub fn generate(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4())
}

fn from_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| Cookie::split_parse(v))
        .filter_map(Result::ok)
        .find(|c| c.name() == name && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

fn from_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = [name, AUTHORIZATION.as_str()]
        .into_iter()
        .filter_map(|n| headers.get(n))
        .filter_map(|v| v.to_str().ok())
        .find(|v| !v.is_empty())?;

    // "<scheme> <token>" carries the identifier in the token part
    let mut parts = value.split(' ');
    parts.next();
    match parts.next() {
        Some(token) if !token.is_empty() => Some(token.to_string()),
        _ => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn header_config() -> SessionConfig {
        SessionConfig::default()
            .with_id_source(IdSource::Header)
            .with_id_key("X-Session")
    }

    #[test]
    fn test_generates_prefixed_id_when_absent() {
        let config = SessionConfig::default();
        let id = resolve(&HeaderMap::new(), &config);
        assert!(id.starts_with("sess_"));
        assert!(id.len() > "sess_".len());
        assert_ne!(id, resolve(&HeaderMap::new(), &config));
    }

    #[test]
    fn test_reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session_id=sess_abc; lang=en"),
        );
        assert_eq!(resolve(&headers, &SessionConfig::default()), "sess_abc");
    }

    #[test]
    fn test_empty_cookie_falls_through_to_generation() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session_id="));
        let id = resolve(&headers, &SessionConfig::default());
        assert!(id.starts_with("sess_"));
        assert_ne!(id, "sess_");
    }

    #[test]
    fn test_cookie_mode_ignores_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        let id = resolve(&headers, &SessionConfig::default());
        assert!(id.starts_with("sess_"));
    }

    #[test]
    fn test_header_mode_prefers_named_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-session", HeaderValue::from_static("direct"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(resolve(&headers, &header_config()), "direct");
    }

    #[test]
    fn test_header_mode_bearer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(resolve(&headers, &header_config()), "abc123");
    }

    #[test]
    fn test_header_mode_bare_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("abc123"));
        assert_eq!(resolve(&headers, &header_config()), "abc123");

        // Trailing space leaves an empty token, so the whole value is used
        headers.insert(AUTHORIZATION, HeaderValue::from_static("abc123 "));
        assert_eq!(resolve(&headers, &header_config()), "abc123 ");
    }

    #[test]
    fn test_header_mode_generates_when_empty() {
        let mut headers = HeaderMap::new();
        headers.insert("x-session", HeaderValue::from_static(""));
        let id = resolve(&headers, &header_config().with_id_prefix("tok_"));
        assert!(id.starts_with("tok_"));
    }
}
