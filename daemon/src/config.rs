use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sessiongate_core::SessionConfig;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Which session store backend the daemon runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub store: StoreBackend,
    pub redis_url: String,
    pub request_timeout_secs: u64,
    /// Policy shared by every session layer the daemon installs
    pub session: SessionConfig,
    /// Attribute `/account` routes require
    pub account_attribute: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            store: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            request_timeout_secs: 30,
            session: SessionConfig::default(),
            account_attribute: "user".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.session = config.session.with_defaults();
        config.session.validate()?;
        Ok(config)
    }
}
