//! Per-connection live feed of one cache key.
//!
//! A [`LiveFeed`] subscribes first and reads the current value second, so a
//! write landing between the two is never lost: at worst the same value is
//! delivered twice. The replayed value, if any, is yielded before updates.

use tracing::debug;

use crate::cache::{LocationCache, Subscription};
use crate::error::CacheError;
use crate::models::IndoorLocation;

pub struct LiveFeed {
    replay: Option<IndoorLocation>,
    subscription: Subscription,
}

impl LiveFeed {
    /// Subscribe to `key` and capture its current value.
    pub async fn open(cache: &dyn LocationCache, key: &str) -> Result<Self, CacheError> {
        // ---
        let subscription = cache.subscribe(key).await?;
        let replay = cache.get(key).await?;

        debug!(key = %key, replay = replay.is_some(), "Live feed opened");
        Ok(Self {
            replay,
            subscription,
        })
    }

    pub fn key(&self) -> &str {
        self.subscription.key()
    }

    /// Current value first, then every update. `None` once closed.
    pub async fn next(&mut self) -> Option<IndoorLocation> {
        // ---
        if self.subscription.is_closed() {
            return None;
        }
        match self.replay.take() {
            Some(current) => Some(current),
            None => self.subscription.recv().await,
        }
    }

    /// Release the subscription. Idempotent.
    pub fn close(&mut self) {
        self.replay = None;
        self.subscription.close();
    }
}
