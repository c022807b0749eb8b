//! Data models for vendor notifications and resolved indoor locations.

use std::{fmt, net::Ipv4Addr, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IngestError;

// ---

/// Venue floor label. Configuration may give it as a number (`2`) or a
/// string (`"Ground"`); numeric labels are emitted back as JSON numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Floor(String);

impl Floor {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Floor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Floor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // ---
        if let Ok(n) = self.0.parse::<i64>() {
            if n.to_string() == self.0 {
                return serializer.serialize_i64(n);
            }
        }
        if let Ok(n) = self.0.parse::<f64>() {
            if n.is_finite() && n.to_string() == self.0 {
                return serializer.serialize_f64(n);
            }
        }
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Floor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // ---
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(serde_json::Number),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Floor(number_label(&n)),
            Raw::Text(s) => Floor(s),
        })
    }
}

/// `2.0` and `2` name the same floor.
fn number_label(n: &serde_json::Number) -> String {
    // ---
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

/// A resolved device position in the venue frame. Replaced wholesale on
/// every write, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndoorLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub floor: Floor,
    pub accuracy: Option<f64>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Message pushed to live-feed observers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndoorLocationChange<'a> {
    pub event: &'static str,
    pub user_id: &'a str,
    pub indoor_location: &'a IndoorLocation,
}

impl<'a> IndoorLocationChange<'a> {
    pub fn new(user_id: &'a str, indoor_location: &'a IndoorLocation) -> Self {
        Self {
            event: "indoorLocationChange",
            user_id,
            indoor_location,
        }
    }
}

// ---

/// Kind of sighting report accepted on ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObservationType {
    DevicesSeen,
    BluetoothDevicesSeen,
}

impl ObservationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationType::DevicesSeen => "DevicesSeen",
            ObservationType::BluetoothDevicesSeen => "BluetoothDevicesSeen",
        }
    }
}

impl FromStr for ObservationType {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DevicesSeen" => Ok(ObservationType::DevicesSeen),
            "BluetoothDevicesSeen" => Ok(ObservationType::BluetoothDevicesSeen),
            other => Err(IngestError::UnsupportedType(other.to_string())),
        }
    }
}

/// Position reported by the access-point vendor, in its own frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ApLocation {
    pub lat: f64,
    pub lng: f64,
    /// Uncertainty radius in meters.
    pub unc: Option<f64>,
}

/// Raw vendor notification body.
#[derive(Debug, Deserialize)]
pub struct Notification {
    pub secret: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: NotificationData,
}

/// Batch of sightings from one access point.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub ap_mac: Option<String>,
    #[serde(default)]
    pub ap_tags: Vec<String>,
    #[serde(default)]
    pub ap_floors: Vec<String>,
    #[serde(default)]
    pub observations: Vec<RawObservation>,
}

/// One device sighting as the vendor sends it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    pub client_mac: Option<String>,
    pub ipv4: Option<String>,
    pub location: Option<ApLocation>,
    pub seen_epoch: Option<i64>,
    pub rssi: Option<i32>,
}

/// A single typed sighting, merged with its batch-level access-point data.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub device_id: Option<String>,
    pub ip: Option<Ipv4Addr>,
    pub location: Option<ApLocation>,
    pub floor_label: Option<String>,
    /// Epoch seconds as reported by the vendor.
    pub timestamp_epoch: Option<i64>,
    pub observation_type: ObservationType,
    pub ap_mac: Option<String>,
    pub ap_tags: Vec<String>,
    pub rssi: Option<i32>,
}

impl Observation {
    /// Cache keys under which this device's position is published: its IPv4
    /// address, plus its MAC when `with_mac` is set. The two keys are written
    /// independently and may briefly disagree.
    pub fn cache_keys(&self, with_mac: bool) -> Vec<String> {
        // ---
        let mut keys = Vec::with_capacity(2);
        if let Some(ip) = self.ip {
            keys.push(ip.to_string());
        }
        if with_mac {
            if let Some(mac) = &self.device_id {
                keys.push(mac.clone());
            }
        }
        keys
    }
}

/// Parse the vendor's IPv4 notation (`"/10.0.0.12"`). Anything that is not a
/// plain IPv4 address yields `None`.
pub fn parse_ipv4(raw: &str) -> Option<Ipv4Addr> {
    raw.strip_prefix('/').unwrap_or(raw).parse().ok()
}

impl Notification {
    /// Unpack the batch into typed observations.
    pub fn observations(&self, observation_type: ObservationType) -> Vec<Observation> {
        // ---
        let floor_label = self.data.ap_floors.first().cloned();

        self.data
            .observations
            .iter()
            .map(|raw| Observation {
                device_id: raw.client_mac.clone(),
                ip: raw.ipv4.as_deref().and_then(parse_ipv4),
                location: raw.location,
                floor_label: floor_label.clone(),
                timestamp_epoch: raw.seen_epoch,
                observation_type,
                ap_mac: self.data.ap_mac.clone(),
                ap_tags: self.data.ap_tags.clone(),
                rssi: raw.rssi,
            })
            .collect()
    }
}
