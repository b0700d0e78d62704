use crate::errors::{SessionError, SessionResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ID_KEY: &str = "session_id";
pub const DEFAULT_ID_PREFIX: &str = "sess_";
pub const DEFAULT_DATA_KEY: &str = "session_data";
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(3600);
pub const DEFAULT_COOKIE_PATH: &str = "/";
/// Longest lifetime browsers honour for a cookie
pub const MAX_EXPIRATION: Duration = Duration::from_secs(400 * 24 * 60 * 60);

/// Where the session identifier travels between client and server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdSource {
    #[default]
    Cookie,
    /// A request header, falling back to `Authorization`
    Header,
}

impl From<String> for IdSource {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("cookie") {
            IdSource::Cookie
        } else {
            IdSource::Header
        }
    }
}

impl From<IdSource> for String {
    fn from(value: IdSource) -> Self {
        value.to_string()
    }
}

impl fmt::Display for IdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdSource::Cookie => f.write_str("cookie"),
            IdSource::Header => f.write_str("header"),
        }
    }
}

impl Serialize for IdSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IdSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(IdSource::from)
    }
}

/// Session policy for one middleware instance.
///
/// Built once and shared read-only by every request the middleware serves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub id_source: IdSource,
    /// Cookie or header name carrying the identifier
    pub id_key: String,
    /// Prefix for freshly generated identifiers
    pub id_prefix: String,
    /// Name the payload is exposed under to handlers
    pub data_key: String,
    /// Record TTL and cookie lifetime
    #[serde(with = "duration_secs")]
    pub expiration: Duration,
    /// Payload key that must be present for the request to proceed. Empty disables the gate.
    pub strict_auth: String,
    /// Upper bound for each store call
    #[serde(with = "opt_duration_secs")]
    pub store_timeout: Option<Duration>,
    pub cookie_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id_source: IdSource::Cookie,
            id_key: DEFAULT_ID_KEY.to_string(),
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            data_key: DEFAULT_DATA_KEY.to_string(),
            expiration: DEFAULT_EXPIRATION,
            strict_auth: String::new(),
            store_timeout: None,
            cookie_path: DEFAULT_COOKIE_PATH.to_string(),
        }
    }
}

impl SessionConfig {
    /// Replaces blank names and a zero expiration with the defaults
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.id_key.is_empty() {
            self.id_key = defaults.id_key;
        }
        if self.id_prefix.is_empty() {
            self.id_prefix = defaults.id_prefix;
        }
        if self.data_key.is_empty() {
            self.data_key = defaults.data_key;
        }
        if self.expiration.is_zero() {
            self.expiration = defaults.expiration;
        }
        if self.cookie_path.is_empty() {
            self.cookie_path = defaults.cookie_path;
        }
        self
    }

    pub fn with_id_source(mut self, source: IdSource) -> Self {
        self.id_source = source;
        self
    }

    pub fn with_id_key(mut self, key: impl Into<String>) -> Self {
        self.id_key = key.into();
        self
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_strict_auth(mut self, key: impl Into<String>) -> Self {
        self.strict_auth = key.into();
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    /// Checks the names can travel as HTTP header / cookie names
    pub fn validate(&self) -> SessionResult<()> {
        if !is_token(&self.id_key) {
            return Err(SessionError::Config(format!(
                "id_key {:?} is not a valid header or cookie name",
                self.id_key
            )));
        }
        if self.expiration.is_zero() {
            return Err(SessionError::Config("expiration must be non-zero".into()));
        }
        if self.expiration > MAX_EXPIRATION {
            return Err(SessionError::Config(format!(
                "expiration must not exceed {} seconds",
                MAX_EXPIRATION.as_secs()
            )));
        }
        if matches!(self.store_timeout, Some(t) if t.is_zero()) {
            return Err(SessionError::Config("store_timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Loads configuration from a TOML file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> SessionResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            SessionError::Config(format!("Failed to read config file: {}", e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> SessionResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            SessionError::Config(format!("Failed to parse config file: {}", e))
        })?;
        Ok(config.with_defaults())
    }
}

/// RFC 7230 `token`
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|o| o.map(Duration::from_secs))
    }
}
