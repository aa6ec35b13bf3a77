use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use authme::auth::SessionManager;
use authme::config::ServerConfig;
use authme::handlers::auth_routes;
use authme::security_logger::{SecurityEvent, SecurityLogger};
use authme::storage::{MemoryTokenCache, MemoryUserStore, SharedTokenCache};

#[tokio::main]
async fn main() {
    // .env may carry RUST_LOG, so load it before the logger but report after
    let dotenv = dotenvy::dotenv();
    env_logger::init();
    match dotenv {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, issuer={}, access_ttl={}s, refresh_ttl={}s",
        config.host,
        config.port,
        config.jwt.issuer,
        config.jwt.access_token_ttl.as_secs(),
        config.jwt.refresh_token_ttl.as_secs()
    );

    let audit = Arc::new(SecurityLogger::new());
    audit.clone().start_cleanup_task();

    let cache = match build_token_cache(&config).await {
        Ok(cache) => cache,
        Err(e) => {
            audit
                .log_event(SecurityEvent::ConfigurationError {
                    component: "token_cache".to_string(),
                    error: e.to_string(),
                })
                .await;
            std::process::exit(1);
        }
    };

    let users = Arc::new(MemoryUserStore::new());

    let sessions = match SessionManager::new(users, cache, config.jwt.clone()) {
        Ok(sessions) => sessions
            .require_confirmed_email(config.require_confirmed_email)
            .with_security_logger(audit),
        Err(e) => {
            audit
                .log_event(SecurityEvent::ConfigurationError {
                    component: "session_manager".to_string(),
                    error: e.to_string(),
                })
                .await;
            std::process::exit(1);
        }
    };

    let routes = auth_routes(Arc::new(sessions), config.min_auth_duration);

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting AuthMe server on {}", addr);
    warp::serve(routes).run(addr).await;
}

#[cfg(feature = "redis-cache")]
async fn build_token_cache(config: &ServerConfig) -> authme::error::Result<SharedTokenCache> {
    use authme::storage::redis_cache::RedisTokenCache;

    match config.cache_url {
        Some(ref url) => Ok(Arc::new(RedisTokenCache::connect(url).await?)),
        None => Ok(memory_cache()),
    }
}

#[cfg(not(feature = "redis-cache"))]
async fn build_token_cache(config: &ServerConfig) -> authme::error::Result<SharedTokenCache> {
    if config.cache_url.is_some() {
        warn!("AUTHME_CACHE_URL is set but this build has no redis-cache feature; using in-memory token cache");
    }
    Ok(memory_cache())
}

fn memory_cache() -> SharedTokenCache {
    let cache = Arc::new(MemoryTokenCache::new());
    cache.clone().start_cleanup_task(Duration::from_secs(60));
    cache
}
