//! Shared Redis store.
//!
//! Values are JSON strings written with `SET .. EX`, so Redis owns expiry.
//! Subscriptions listen to keyspace notifications for one key on a dedicated
//! pub/sub connection and re-read the key on every `set` event; a burst of
//! writes may therefore surface as fewer updates, always ending on the latest
//! value.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo};
use tracing::{debug, info, warn};

use super::{subscription, LocationCache, Subscription};
use crate::error::CacheError;
use crate::models::IndoorLocation;

const NOTIFY_KEYSPACE_EVENTS: &str = "notify-keyspace-events";

pub struct RedisCache {
    client: redis::Client,
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect and make sure keyspace notifications are on.
    pub async fn connect(
        host: &str,
        port: u16,
        password: Option<String>,
    ) -> Result<Self, CacheError> {
        // ---
        let mut info = (host, port).into_connection_info()?;
        info.redis.password = password;

        let client = redis::Client::open(info)?;
        let mut connection = ConnectionManager::new(client.clone()).await?;

        // Managed deployments often forbid CONFIG; they must enable the
        // notifications themselves.
        if let Err(e) = enable_keyspace_events(&mut connection).await {
            warn!(error = %e, "Could not enable keyspace notifications, live feeds may stay silent");
        }

        info!("The Redis connection is UP");
        Ok(Self { client, connection })
    }
}

/// Add the flags subscriptions need (`K` keyspace channel, `$` string
/// commands) to the server's current setting, leaving other flags alone.
async fn enable_keyspace_events(connection: &mut ConnectionManager) -> redis::RedisResult<()> {
    // ---
    let current: HashMap<String, String> = redis::cmd("CONFIG")
        .arg("GET")
        .arg(NOTIFY_KEYSPACE_EVENTS)
        .query_async(connection)
        .await?;
    let current = current
        .get(NOTIFY_KEYSPACE_EVENTS)
        .map(String::as_str)
        .unwrap_or_default();

    let Some(flags) = merge_keyspace_flags(current) else {
        debug!(flags = %current, "Keyspace notifications already enabled");
        return Ok(());
    };
    let _: () = redis::cmd("CONFIG")
        .arg("SET")
        .arg(NOTIFY_KEYSPACE_EVENTS)
        .arg(&flags)
        .query_async(connection)
        .await?;

    info!(from = %current, to = %flags, "Keyspace notifications enabled");
    Ok(())
}

/// `current` plus whatever of `K` and `$` it lacks, or `None` when nothing is
/// missing. `A` already covers `$`.
fn merge_keyspace_flags(current: &str) -> Option<String> {
    // ---
    let mut flags = current.to_string();
    if !current.contains('K') {
        flags.push('K');
    }
    if !current.contains('$') && !current.contains('A') {
        flags.push('$');
    }
    (flags != current).then_some(flags)
}

/// Channel pattern matching keyspace events for exactly `key`, in any
/// database.
fn keyspace_pattern(key: &str) -> String {
    // ---
    let mut pattern = String::from("__keyspace@*__:");
    for c in key.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern
}

async fn read(
    connection: &mut ConnectionManager,
    key: &str,
) -> Result<Option<IndoorLocation>, CacheError> {
    // ---
    let raw: Option<String> = connection.get(key).await?;
    Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
}

#[async_trait]
impl LocationCache for RedisCache {
    async fn set(
        &self,
        key: &str,
        value: &IndoorLocation,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        // ---
        let json = serde_json::to_string(value)?;
        let mut connection = self.connection.clone();

        connection
            .set_ex::<_, _, ()>(key, json, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<IndoorLocation>, CacheError> {
        let mut connection = self.connection.clone();
        read(&mut connection, key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>, CacheError> {
        // ---
        let mut connection = self.connection.clone();
        let keys: Vec<String> = connection.keys("*").await?;
        Ok(keys)
    }

    async fn subscribe(&self, key: &str) -> Result<Subscription, CacheError> {
        // ---
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(keyspace_pattern(key)).await?;

        let (publisher, subscription) = subscription::channel(key);
        let mut connection = self.connection.clone();
        let key = key.to_string();

        tokio::spawn(async move {
            let mut messages = Box::pin(pubsub.into_on_message());
            loop {
                tokio::select! {
                    _ = publisher.closed() => break,
                    message = messages.next() => {
                        let Some(message) = message else {
                            warn!(key = %key, "Keyspace notification stream ended");
                            break;
                        };
                        let event: String = match message.get_payload() {
                            Ok(event) => event,
                            Err(e) => {
                                warn!(key = %key, error = %e, "Unreadable keyspace event");
                                continue;
                            }
                        };
                        if event != "set" {
                            continue;
                        }
                        match read(&mut connection, &key).await {
                            Ok(Some(value)) => {
                                if !publisher.publish(value).await {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => warn!(key = %key, error = %e, "Failed to read updated key"),
                        }
                    }
                }
            }
            // Dropping the stream closes the pub/sub connection
            debug!(key = %key, "Redis subscription task finished");
        });

        Ok(subscription)
    }
}
