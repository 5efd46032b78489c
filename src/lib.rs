//! Sliding-window rate limiting over a shared, ordered timestamp log.
//!
//! A [`SlidingWindowRateLimiter`](rate_limit::SlidingWindowRateLimiter)
//! records each hit on a named subject and decides whether the subject has
//! exceeded `max_hits` within the trailing `window_size_ms`. Each decision is a
//! single atomic batch against an
//! [`OrderedTimestampStore`](rate_limit::OrderedTimestampStore), so concurrent
//! callers in any number of processes never act on a torn count.

pub mod config;
pub mod error;
pub mod metrics;
pub mod rate_limit;

use crate::config::{LimiterConfig, StoreBackend};
use crate::error::Result;
use crate::rate_limit::{InMemoryStore, OrderedTimestampStore, RedisStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the store selected by `config`.
///
/// The in-memory store gets a background sweeper, so this must run inside a
/// tokio runtime.
pub async fn connect_store(config: &LimiterConfig) -> Result<Arc<dyn OrderedTimestampStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            let store = Arc::new(InMemoryStore::new());
            store.spawn_purge_task(Duration::from_millis(config.store.purge_interval_ms));
            Ok(store)
        }
        StoreBackend::Redis => {
            info!("Using Redis store at {}", config.store.url);
            let store = RedisStore::new(&config.store.url).await?;
            store.ping().await?;
            Ok(Arc::new(store))
        }
    }
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sliding_limiter=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
