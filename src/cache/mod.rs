//! Key-value cache of resolved locations with change notification.
//!
//! [`LocationCache`] is the whole contract: `set` with a TTL, `get`,
//! `list_keys` and `subscribe`. Two backends implement it, an in-process
//! expiring map and a shared Redis store, and one is picked once at startup
//! by [`connect`]. Everything else holds an `Arc<dyn LocationCache>` and never
//! learns which one it got.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::info;

use crate::config::CacheSettings;
use crate::error::CacheError;
use crate::models::IndoorLocation;

mod memory;
mod redis_cache;
mod subscription;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;
pub use subscription::Subscription;

/// Shared handle to whichever backend was configured.
pub type SharedCache = Arc<dyn LocationCache>;

#[async_trait]
pub trait LocationCache: Send + Sync {
    /// Upsert `value` under `key` and restart its time-to-live. Concurrent
    /// writers race; the last write wins.
    async fn set(&self, key: &str, value: &IndoorLocation, ttl: Duration)
        -> Result<(), CacheError>;

    /// Current value, or `None` if never set or expired.
    async fn get(&self, key: &str) -> Result<Option<IndoorLocation>, CacheError>;

    /// Best-effort snapshot of live keys.
    async fn list_keys(&self) -> Result<Vec<String>, CacheError>;

    /// Live feed of values written to `key` by any writer from now on.
    async fn subscribe(&self, key: &str) -> Result<Subscription, CacheError>;
}

/// Build the configured backend.
pub async fn connect(settings: &CacheSettings) -> Result<SharedCache, CacheError> {
    // ---
    match settings {
        CacheSettings::Memory => {
            info!("Using in-memory cache");
            Ok(Arc::new(MemoryCache::new()))
        }
        CacheSettings::Redis {
            host,
            port,
            password,
        } => {
            info!("Using Redis cache at {}:{}", host, port);
            let cache = RedisCache::connect(host, *port, password.clone()).await?;
            Ok(Arc::new(cache))
        }
    }
}
