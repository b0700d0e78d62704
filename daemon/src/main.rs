use clap::Parser;
use sessiongate_core::{InMemorySessionStore, SessionStoreRef};
use sessiongate_daemon::config::{AppConfig, StoreBackend};
use sessiongate_daemon::http_server;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sessiongate-daemon", about = "HTTP service with per-request sessions")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP server address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Session store backend
    #[arg(long, value_enum)]
    store: Option<StoreBackend>,

    /// Redis connection URL (redis backend only)
    #[arg(long)]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting sessiongate daemon");

    // Parse command line args
    let args = Args::parse();

    // Load config from file or use defaults
    let mut config = match &args.config {
        Some(config_path) => match AppConfig::load_from_file(config_path) {
            Ok(cfg) => {
                info!("Loaded configuration from {}", config_path.display());
                cfg
            }
            Err(e) => {
                error!("Failed to load configuration from {}: {:#}", config_path.display(), e);
                return Err(anyhow::anyhow!("Configuration error: {:#}", e));
            }
        },
        None => {
            warn!("No config file given, using defaults");
            AppConfig::default()
        }
    };

    // Update config from CLI args
    if let Some(http_addr) = args.http_addr {
        config.http_addr = http_addr;
    }
    if let Some(store) = args.store {
        config.store = store;
    }
    if let Some(redis_url) = args.redis_url {
        config.redis_url = redis_url;
    }

    let store = connect_store(&config).await?;

    if let Err(e) = http_server::run_server(config, store).await {
        error!(error = %e, "HTTP server failed");
        return Err(e);
    }

    info!("sessiongate daemon shutting down");
    Ok(())
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<SessionStoreRef> {
    match config.store {
        StoreBackend::Memory => {
            info!("Using in-memory session store");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
        #[cfg(feature = "redis-store")]
        StoreBackend::Redis => {
            info!("Using redis session store at {}", config.redis_url);
            let store = sessiongate_core::RedisSessionStore::connect(&config.redis_url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to redis: {}", e))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis-store"))]
        StoreBackend::Redis => Err(anyhow::anyhow!(
            "redis backend requested but the daemon was built without the redis-store feature"
        )),
    }
}
