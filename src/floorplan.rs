//! Floor-plan registry and per-observation location resolver.
//!
//! The registry is built once at startup from the configured floor plans.
//! Each entry carries the same four physical corners twice: as the access-point
//! vendor georeferenced them and as the venue-authoring system did. Corner
//! sets are projected to planar XY here so resolving an observation is two
//! dot products and one inverse projection.
//!
//! Bad entries are logged and skipped; a partially valid configuration still
//! produces a usable registry.

use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::geometry::{
    self, CalibrationPoint, Corners, Georeference, LatLng, Point2D, RECTANGLE_TOLERANCE,
};
use crate::models::{Floor, IndoorLocation, Observation};

// ---

/// Vendor image bounds: pixel (0,0) is the south-west corner and pixel
/// (width, height) the north-east corner.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApBounds {
    sw_lat: f64,
    sw_lng: f64,
    ne_lat: f64,
    ne_lng: f64,
    width: f64,
    height: f64,
}

impl ApBounds {
    fn corners(&self) -> Result<Corners<LatLng>, ConfigError> {
        // ---
        let georeference = Georeference::new(
            CalibrationPoint::new(Point2D::new(0.0, 0.0), LatLng::new(self.sw_lat, self.sw_lng)),
            CalibrationPoint::new(
                Point2D::new(self.width, self.height),
                LatLng::new(self.ne_lat, self.ne_lng),
            ),
        )?;
        Ok(georeference.image_corners(self.width, self.height))
    }
}

/// One floor-plan entry as written in configuration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FloorPlanEntry {
    name: Option<String>,
    floor: Option<Floor>,
    #[serde(alias = "merakiCorners")]
    ap_corners: Option<Vec<LatLng>>,
    ap_bounds: Option<ApBounds>,
    #[serde(alias = "mapwizeCorners")]
    venue_corners: Option<Vec<LatLng>>,
}

fn corners_from(field: &'static str, values: &[LatLng]) -> Result<Corners<LatLng>, ConfigError> {
    Corners::from_ordered(values).ok_or(ConfigError::CornerCount {
        field,
        count: values.len(),
    })
}

/// A validated floor plan with memoized planar corners.
#[derive(Debug, Clone)]
pub struct FloorPlan {
    pub name: String,
    pub floor: Floor,
    pub ap_corners: Corners<LatLng>,
    pub venue_corners: Corners<LatLng>,
    ap_xy: Corners<Point2D>,
    venue_xy: Corners<Point2D>,
}

impl FloorPlan {
    /// Build a floor plan from explicit corner sets.
    pub fn new(
        name: impl Into<String>,
        floor: Floor,
        ap_corners: Corners<LatLng>,
        venue_corners: Corners<LatLng>,
    ) -> Result<Self, ConfigError> {
        // ---
        let ap_xy = ap_corners.to_planar();
        let venue_xy = venue_corners.to_planar();
        ap_xy.validate()?;
        venue_xy.validate()?;

        Ok(Self {
            name: name.into(),
            floor,
            ap_corners,
            venue_corners,
            ap_xy,
            venue_xy,
        })
    }

    /// Parse and validate one configuration entry.
    pub fn from_config(entry: &Value) -> Result<Self, ConfigError> {
        // ---
        let entry: FloorPlanEntry =
            serde_json::from_value(entry.clone()).map_err(|e| ConfigError::InvalidJson {
                var: "FLOOR_PLANS",
                message: e.to_string(),
            })?;

        let name = entry.name.ok_or(ConfigError::MissingField("name"))?;
        let venue_corners = entry
            .venue_corners
            .ok_or(ConfigError::MissingField("venueCorners"))?;
        let venue_corners = corners_from("venueCorners", &venue_corners)?;

        let ap_corners = match (entry.ap_corners, entry.ap_bounds) {
            (Some(corners), _) => corners_from("apCorners", &corners)?,
            (None, Some(bounds)) => bounds.corners()?,
            (None, None) => return Err(ConfigError::MissingField("apCorners")),
        };

        let floor = entry.floor.unwrap_or_else(|| Floor::new(name.clone()));
        Self::new(name, floor, ap_corners, venue_corners)
    }

    /// Worst rectangle skew of the two corner sets.
    pub fn skew(&self) -> f64 {
        self.ap_xy
            .rectangle_skew()
            .max(self.venue_xy.rectangle_skew())
    }

    /// Carry a vendor-frame position into the venue frame.
    pub fn project(&self, position: LatLng) -> LatLng {
        // ---
        let planar = self
            .ap_xy
            .project_onto(geometry::forward(position), &self.venue_xy);
        geometry::inverse(planar)
    }
}

/// Immutable lookup of floor plans by name.
#[derive(Debug, Clone, Default)]
pub struct FloorPlanRegistry {
    plans: HashMap<String, FloorPlan>,
}

impl FloorPlanRegistry {
    /// Build the registry from raw configuration entries, skipping (and
    /// logging) every entry that cannot be used.
    pub fn build(entries: &[Value]) -> Self {
        // ---
        let mut plans = HashMap::new();

        for (index, entry) in entries.iter().enumerate() {
            let plan = match FloorPlan::from_config(entry) {
                Ok(plan) => plan,
                Err(e) => {
                    warn!(index, error = %e, "Floor plan not correctly defined, skipping");
                    continue;
                }
            };

            let skew = plan.skew();
            if skew > RECTANGLE_TOLERANCE {
                warn!(
                    floor_plan = %plan.name,
                    skew,
                    ap_corner_angle = plan.ap_xy.bottom_left_angle(),
                    venue_corner_angle = plan.venue_xy.bottom_left_angle(),
                    "Calibration quad is not rectangular, projections will be approximate"
                );
            }

            debug!(floor_plan = %plan.name, floor = %plan.floor, "Floor plan registered");
            if let Some(previous) = plans.insert(plan.name.clone(), plan) {
                warn!(floor_plan = %previous.name, "Duplicate floor plan name, keeping the last one");
            }
        }

        info!("{} of {} floor plans registered", plans.len(), entries.len());
        Self { plans }
    }

    pub fn get(&self, name: &str) -> Option<&FloorPlan> {
        self.plans.get(name)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

// ---

/// Why an observation could not be placed. Not an error: the caller simply
/// skips the cache write.
#[derive(Debug, Clone, PartialEq)]
pub enum Miss {
    UnknownFloor(Option<String>),
    NoLocation,
}

/// Outcome of resolving one observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(IndoorLocation),
    Unresolved(Miss),
}

impl Resolution {
    pub fn location(&self) -> Option<&IndoorLocation> {
        match self {
            Resolution::Resolved(location) => Some(location),
            Resolution::Unresolved(_) => None,
        }
    }
}

/// Places vendor observations in the venue frame.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    registry: FloorPlanRegistry,
}

impl LocationResolver {
    pub fn new(registry: FloorPlanRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FloorPlanRegistry {
        &self.registry
    }

    /// Resolve using the current wall clock for observations without a
    /// timestamp.
    pub fn resolve(&self, observation: &Observation) -> Resolution {
        self.resolve_at(observation, Utc::now().timestamp_millis())
    }

    /// Resolve with an explicit fallback timestamp in epoch milliseconds.
    pub fn resolve_at(&self, observation: &Observation, now_millis: i64) -> Resolution {
        // ---
        let plan = match observation
            .floor_label
            .as_deref()
            .and_then(|label| self.registry.get(label))
        {
            Some(plan) => plan,
            None => {
                return Resolution::Unresolved(Miss::UnknownFloor(observation.floor_label.clone()))
            }
        };

        let Some(reported) = observation.location else {
            return Resolution::Unresolved(Miss::NoLocation);
        };

        let position = plan.project(LatLng::new(reported.lat, reported.lng));

        Resolution::Resolved(IndoorLocation {
            latitude: position.lat,
            longitude: position.lng,
            floor: plan.floor.clone(),
            accuracy: reported.unc,
            // Out-of-range vendor epochs fall back to the clock
            timestamp: observation
                .timestamp_epoch
                .and_then(|secs| secs.checked_mul(1000))
                .unwrap_or(now_millis),
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{ApLocation, ObservationType};
    use serde_json::json;

    const TOLERANCE_DEG: f64 = 1e-9;

    fn unit_corners() -> Value {
        json!([
            {"lat": 1.0, "lng": 0.0},
            {"lat": 1.0, "lng": 1.0},
            {"lat": 0.0, "lng": 0.0},
            {"lat": 0.0, "lng": 1.0}
        ])
    }

    fn observation(floor: &str, lat: f64, lng: f64) -> Observation {
        // ---
        Observation {
            device_id: Some("d8:8f:76:8f:b1:e5".into()),
            ip: Some("10.0.0.7".parse().unwrap()),
            location: Some(ApLocation {
                lat,
                lng,
                unc: Some(2.5),
            }),
            floor_label: Some(floor.into()),
            timestamp_epoch: Some(1_700_000_000),
            observation_type: ObservationType::DevicesSeen,
            ap_mac: None,
            ap_tags: Vec::new(),
            rssi: None,
        }
    }

    /// Corners of a `width` x `height` meter rectangle, rotated by `angle`
    /// radians around its bottom-left corner `origin`, as configuration JSON.
    fn rectangle(origin: LatLng, width: f64, height: f64, angle: f64) -> Value {
        // ---
        let base = geometry::forward(origin);
        let (sin, cos) = angle.sin_cos();
        let bottom = Point2D::new(width * cos, width * sin);
        let left = Point2D::new(-height * sin, height * cos);
        let corners = Corners {
            top_left: base + left,
            top_right: base + left + bottom,
            bottom_left: base,
            bottom_right: base + bottom,
        };

        corners
            .to_ordered()
            .iter()
            .map(|p| {
                let position = geometry::inverse(*p);
                json!({"lat": position.lat, "lng": position.lng})
            })
            .collect()
    }

    /// The vendor draws the floor axis-aligned; the venue authoring tool has
    /// it rotated, shifted and at a slightly different scale.
    fn euratech_entry() -> Value {
        json!({
            "name": "Euratech 2",
            "floor": 2,
            "merakiCorners": rectangle(LatLng::new(50.6323, 3.0191), 140.0, 95.0, 0.0),
            "mapwizeCorners": rectangle(LatLng::new(50.6325, 3.0193), 136.0, 92.5, 0.35)
        })
    }

    #[test]
    fn test_centroid_resolves_to_centroid() {
        // ---
        let registry = FloorPlanRegistry::build(&[json!({
            "name": "2",
            "floor": "2",
            "apCorners": unit_corners(),
            "venueCorners": unit_corners()
        })]);
        let resolver = LocationResolver::new(registry);

        let resolution = resolver.resolve(&observation("2", 0.5, 0.5));
        let location = resolution.location().expect("resolved");

        assert!((location.latitude - 0.5).abs() < TOLERANCE_DEG);
        assert!((location.longitude - 0.5).abs() < TOLERANCE_DEG);
        assert_eq!(location.floor, Floor::new("2"));
        assert_eq!(location.accuracy, Some(2.5));
        assert_eq!(location.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_ap_corners_reproduce_venue_corners() {
        // ---
        let registry = FloorPlanRegistry::build(&[euratech_entry()]);
        let plan = registry.get("Euratech 2").unwrap();

        for (ap, venue) in plan
            .ap_corners
            .to_ordered()
            .iter()
            .zip(plan.venue_corners.to_ordered())
        {
            let projected = plan.project(*ap);
            assert!((projected.lat - venue.lat).abs() < TOLERANCE_DEG);
            assert!((projected.lng - venue.lng).abs() < TOLERANCE_DEG);
        }
    }

    #[test]
    fn test_self_projection_is_identity() {
        // ---
        let mut entry = euratech_entry();
        entry["mapwizeCorners"] = entry["merakiCorners"].clone();
        let registry = FloorPlanRegistry::build(&[entry]);
        let plan = registry.get("Euratech 2").unwrap();

        let inside = LatLng::new(50.6326, 3.0199);
        let projected = plan.project(inside);
        assert!((projected.lat - inside.lat).abs() < TOLERANCE_DEG);
        assert!((projected.lng - inside.lng).abs() < TOLERANCE_DEG);
    }

    #[test]
    fn test_unknown_floor_is_unresolved() {
        // ---
        let resolver = LocationResolver::new(FloorPlanRegistry::build(&[euratech_entry()]));

        assert_eq!(
            resolver.resolve(&observation("Euratech 9", 50.633, 3.020)),
            Resolution::Unresolved(Miss::UnknownFloor(Some("Euratech 9".into())))
        );

        let mut no_floor = observation("Euratech 2", 50.633, 3.020);
        no_floor.floor_label = None;
        assert_eq!(
            resolver.resolve(&no_floor),
            Resolution::Unresolved(Miss::UnknownFloor(None))
        );
    }

    #[test]
    fn test_missing_location_is_unresolved() {
        // ---
        let resolver = LocationResolver::new(FloorPlanRegistry::build(&[euratech_entry()]));
        let mut obs = observation("Euratech 2", 0.0, 0.0);
        obs.location = None;

        assert_eq!(resolver.resolve(&obs), Resolution::Unresolved(Miss::NoLocation));
    }

    #[test]
    fn test_timestamp_falls_back_to_now() {
        // ---
        let resolver = LocationResolver::new(FloorPlanRegistry::build(&[euratech_entry()]));
        let mut obs = observation("Euratech 2", 50.633, 3.020);
        obs.timestamp_epoch = None;

        let resolution = resolver.resolve_at(&obs, 42);
        assert_eq!(resolution.location().unwrap().timestamp, 42);
        assert_eq!(resolution.location().unwrap().floor, Floor::new("2"));
    }

    #[test]
    fn test_oversized_epoch_falls_back_to_now() {
        // ---
        let resolver = LocationResolver::new(FloorPlanRegistry::build(&[euratech_entry()]));
        let mut obs = observation("Euratech 2", 50.633, 3.020);

        for epoch in [10_000_000_000_000_000, i64::MAX, i64::MIN] {
            obs.timestamp_epoch = Some(epoch);
            let resolution = resolver.resolve_at(&obs, 42);
            assert_eq!(resolution.location().unwrap().timestamp, 42);
        }
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        // ---
        let registry = FloorPlanRegistry::build(&[
            json!({"name": "no corners", "floor": 1}),
            json!({"floor": 1, "apCorners": unit_corners(), "venueCorners": unit_corners()}),
            json!({"name": "three", "apCorners": [{"lat": 0.0, "lng": 0.0}, {"lat": 1.0, "lng": 0.0}, {"lat": 0.0, "lng": 1.0}], "venueCorners": unit_corners()}),
            json!({"name": "flat", "apCorners": [
                {"lat": 0.0, "lng": 0.0}, {"lat": 0.0, "lng": 1.0},
                {"lat": 0.0, "lng": 0.0}, {"lat": 0.0, "lng": 1.0}
            ], "venueCorners": unit_corners()}),
            json!("not an object"),
            euratech_entry(),
        ]);

        assert_eq!(registry.len(), 1);
        assert!(registry.get("Euratech 2").is_some());
    }

    #[test]
    fn test_entry_errors() {
        // ---
        assert_eq!(
            FloorPlan::from_config(&json!({"venueCorners": unit_corners()})).unwrap_err(),
            ConfigError::MissingField("name")
        );
        assert_eq!(
            FloorPlan::from_config(&json!({"name": "a", "venueCorners": unit_corners()}))
                .unwrap_err(),
            ConfigError::MissingField("apCorners")
        );
        assert_eq!(
            FloorPlan::from_config(&json!({"name": "a", "apCorners": [], "venueCorners": unit_corners()}))
                .unwrap_err(),
            ConfigError::CornerCount {
                field: "apCorners",
                count: 0
            }
        );
    }

    #[test]
    fn test_floor_defaults_to_name() {
        // ---
        let plan = FloorPlan::from_config(&json!({
            "name": "Lobby",
            "apCorners": unit_corners(),
            "venueCorners": unit_corners()
        }))
        .unwrap();
        assert_eq!(plan.floor, Floor::new("Lobby"));
    }

    #[test]
    fn test_ap_bounds_derive_corners() {
        // ---
        let sw = LatLng::new(50.6323, 3.0190);
        let ne = LatLng::new(50.6340, 3.0215);
        let plan = FloorPlan::from_config(&json!({
            "name": "Bounds",
            "floor": 0,
            "apBounds": {
                "swLat": sw.lat, "swLng": sw.lng,
                "neLat": ne.lat, "neLng": ne.lng,
                "width": 1600.0, "height": 1000.0
            },
            "venueCorners": euratech_entry()["mapwizeCorners"].clone()
        }))
        .unwrap();

        assert!((plan.ap_corners.bottom_left.lat - sw.lat).abs() < TOLERANCE_DEG);
        assert!((plan.ap_corners.bottom_left.lng - sw.lng).abs() < TOLERANCE_DEG);
        assert!((plan.ap_corners.top_right.lat - ne.lat).abs() < TOLERANCE_DEG);
        assert!((plan.ap_corners.top_right.lng - ne.lng).abs() < TOLERANCE_DEG);
        assert!(plan.ap_xy.rectangle_skew() < 1e-9);
    }

    #[test]
    fn test_skewed_quad_is_kept() {
        // ---
        let registry = FloorPlanRegistry::build(&[json!({
            "name": "kite",
            "apCorners": [
                {"lat": 1.0, "lng": 0.0}, {"lat": 2.0, "lng": 2.0},
                {"lat": 0.0, "lng": 0.0}, {"lat": 0.0, "lng": 1.0}
            ],
            "venueCorners": unit_corners()
        })]);

        let plan = registry.get("kite").expect("skewed quads are warned about, not rejected");
        assert!(plan.skew() > RECTANGLE_TOLERANCE);
    }
}
