//! Redis-backed distributed state. Optional: everything degrades gracefully
//! when no REDIS_URL is configured.

pub mod token_revocation;

use deadpool_redis::{Config as RedisPoolConfig, Pool, Runtime};
use tracing::info;

use crate::config::RedisConfig;

pub use token_revocation::TokenRevocationList;

pub fn create_redis_pool(config: &RedisConfig) -> Option<Pool> {
    let url = config.url.as_ref()?;

    let timeout = std::time::Duration::from_secs(config.connection_timeout_secs);
    let cfg = RedisPoolConfig::from_url(url);
    let pool = cfg.builder().ok().and_then(|b| {
        b.max_size(config.pool_size)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .ok()
    });

    if pool.is_some() {
        info!(redis_url = %url.split('@').next_back().unwrap_or("***"), "Redis pool created");
    }

    pool
}
