//! Single-process expiring store.
//!
//! Entries carry their own deadline and are dropped lazily: reads ignore
//! anything past its deadline and writes sweep the map at most once per
//! [`SWEEP_INTERVAL`]. Change notification rides on one broadcast channel that
//! every subscription filters by key.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{subscription, LocationCache, Subscription};
use crate::error::CacheError;
use crate::models::IndoorLocation;

/// Pending change events kept for subscribers that fall behind.
const EVENT_CAPACITY: usize = 1024;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    value: IndoorLocation,
    expires_at: Instant,
}

struct Entries {
    map: HashMap<String, Entry>,
    next_sweep: Instant,
}

pub struct MemoryCache {
    entries: RwLock<Entries>,
    events: broadcast::Sender<(String, IndoorLocation)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        // ---
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                next_sweep: Instant::now() + SWEEP_INTERVAL,
            }),
            events,
        }
    }
}

impl MemoryCache {
    /// Live subscriptions; each one's task is counted until it has exited.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationCache for MemoryCache {
    async fn set(
        &self,
        key: &str,
        value: &IndoorLocation,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        // ---
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        if now >= entries.next_sweep {
            let before = entries.map.len();
            entries.map.retain(|_, entry| entry.expires_at > now);
            entries.next_sweep = now + SWEEP_INTERVAL;
            debug!("Swept {} expired entries", before - entries.map.len());
        }

        entries.map.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                expires_at: now + ttl,
            },
        );

        // Published under the write lock so subscribers see writes in store order
        let _ = self.events.send((key.to_string(), value.clone()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<IndoorLocation>, CacheError> {
        // ---
        let entries = self.entries.read().await;
        let now = Instant::now();

        Ok(entries
            .map
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone()))
    }

    async fn list_keys(&self) -> Result<Vec<String>, CacheError> {
        // ---
        let entries = self.entries.read().await;
        let now = Instant::now();

        Ok(entries
            .map
            .iter()
            .filter(|(_, entry)| entry.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn subscribe(&self, key: &str) -> Result<Subscription, CacheError> {
        // ---
        // Receiver exists before this returns, so no later write is missed
        let mut events = self.events.subscribe();
        let (publisher, subscription) = subscription::channel(key);
        let key = key.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = publisher.closed() => break,
                    event = events.recv() => match event {
                        Ok((changed, value)) if changed == key => {
                            if !publisher.publish(value).await {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(key = %key, skipped, "Subscriber lagged, updates dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!(key = %key, "Memory subscription task finished");
        });

        Ok(subscription)
    }
}
