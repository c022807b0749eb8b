//! Vendor notification processing.
//!
//! A notification is checked as a whole (secret, then type) and then handled
//! observation by observation: each one is resolved to the venue frame and,
//! when that succeeds, written to the cache under every key of the device.
//! A failed write is logged and skipped; the rest of the batch still goes
//! through.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::analytics::ObservationRecord;
use crate::error::IngestError;
use crate::floorplan::{Miss, Resolution};
use crate::models::{Notification, ObservationType};
use crate::state::AppState;

/// Outcome counters for one notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub observations: usize,
    pub resolved: usize,
    pub writes: usize,
    pub failed_writes: usize,
}

/// Reject a notification with the wrong secret or an unsupported type.
/// `secret == None` accepts any secret.
pub fn validate(
    notification: &Notification,
    secret: Option<&str>,
) -> Result<ObservationType, IngestError> {
    // ---
    if let Some(expected) = secret {
        if notification.secret.as_deref() != Some(expected) {
            return Err(IngestError::WrongSecret);
        }
    }
    notification.kind.parse()
}

/// Validate and apply one notification.
pub async fn ingest(
    state: &AppState,
    notification: &Notification,
) -> Result<IngestSummary, IngestError> {
    // ---
    let observation_type = validate(notification, state.config.secret.as_deref())?;
    let observations = notification.observations(observation_type);

    info!(
        "{} devices seen from AP {}",
        observations.len(),
        notification.data.ap_mac.as_deref().unwrap_or("(unknown)")
    );

    let mut summary = IngestSummary {
        observations: observations.len(),
        ..Default::default()
    };
    let now_millis = Utc::now().timestamp_millis();
    let ttl = state.config.notification_ttl;

    for observation in &observations {
        let location = match state.resolver.resolve_at(observation, now_millis) {
            Resolution::Resolved(location) => location,
            Resolution::Unresolved(Miss::UnknownFloor(floor)) => {
                debug!(floor = ?floor, device = ?observation.device_id, "No floor plan, skipping");
                continue;
            }
            Resolution::Unresolved(Miss::NoLocation) => {
                debug!(device = ?observation.device_id, "No location, skipping");
                continue;
            }
        };
        summary.resolved += 1;

        for key in observation.cache_keys(state.config.mac_address_enabled) {
            match state.cache.set(&key, &location, ttl).await {
                Ok(()) => summary.writes += 1,
                Err(e) => {
                    summary.failed_writes += 1;
                    warn!(key = %key, error = %e, "Failed to cache location");
                }
            }
        }

        if let Some(sink) = &state.sink {
            let area = state.areas.area_for(&location);
            sink.record(ObservationRecord::new(observation, &location, area));
        }
    }

    debug!(?summary, "Notification processed");
    Ok(summary)
}
