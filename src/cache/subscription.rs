//! Cancellable live feed shared by every backend.
//!
//! A backend creates a [`Publisher`]/[`Subscription`] pair and drives the
//! publisher from a task of its own. Closing the subscription, explicitly or
//! by dropping it, cancels that task and releases whatever the backend held
//! for it (a broadcast receiver, a pub/sub connection).

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::models::IndoorLocation;

/// Updates buffered between a backend task and a slow consumer.
const UPDATE_BUFFER: usize = 16;

/// Create a connected publisher/subscription pair for `key`.
pub(crate) fn channel(key: &str) -> (Publisher, Subscription) {
    // ---
    let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
    let cancel = CancellationToken::new();

    let publisher = Publisher {
        updates: tx,
        cancel: cancel.clone(),
    };
    let subscription = Subscription {
        key: key.to_string(),
        updates: rx,
        cancel,
    };
    (publisher, subscription)
}

/// Backend side of a live feed.
pub(crate) struct Publisher {
    updates: mpsc::Sender<IndoorLocation>,
    cancel: CancellationToken,
}

impl Publisher {
    /// Deliver one update. Returns `false` once the subscription is closed,
    /// which tells the backend task to stop.
    pub(crate) async fn publish(&self, value: IndoorLocation) -> bool {
        // ---
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.updates.send(value) => sent.is_ok(),
        }
    }

    /// Resolves when the subscription is closed or dropped.
    pub(crate) async fn closed(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.updates.closed() => {}
        }
    }
}

/// Consumer side of a live feed on one key.
///
/// After [`close`](Subscription::close) (or drop) no further update is
/// delivered, even if one was already buffered.
pub struct Subscription {
    key: String,
    updates: mpsc::Receiver<IndoorLocation>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next update, or `None` once closed.
    pub async fn recv(&mut self) -> Option<IndoorLocation> {
        // ---
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            update = self.updates.recv() => update,
        }
    }

    /// Stop the feed. Idempotent.
    pub fn close(&mut self) {
        // ---
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.updates.close();
        debug!(key = %self.key, "Subscription closed");
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
