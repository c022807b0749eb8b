//! Named zones and point-in-zone lookup.
//!
//! Zones come from a GeoJSON `FeatureCollection`; each usable feature has a
//! `name`, a `floor` and a `Polygon` geometry whose outer ring is projected to
//! planar XY once at startup.

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::geometry::{self, is_inside, LatLng, Point2D};
use crate::models::{Floor, IndoorLocation};

// ---

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Properties,
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    name: Option<String>,
    floor: Option<Floor>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Vec<Vec<Vec<f64>>>,
}

/// A named zone on one floor.
#[derive(Debug, Clone)]
pub struct Area {
    pub name: String,
    pub floor: Floor,
    polygon: Vec<Point2D>,
}

impl Area {
    fn from_feature(feature: &Value) -> Result<Self, ConfigError> {
        // ---
        let feature: Feature =
            serde_json::from_value(feature.clone()).map_err(|e| ConfigError::InvalidJson {
                var: "AREAS",
                message: e.to_string(),
            })?;

        let name = feature.properties.name.ok_or(ConfigError::MissingField("name"))?;
        let floor = feature.properties.floor.ok_or(ConfigError::MissingField("floor"))?;
        let shape = feature.geometry.ok_or(ConfigError::MissingField("geometry"))?;

        if shape.kind != "Polygon" {
            return Err(ConfigError::UnsupportedGeometry(shape.kind));
        }
        // GeoJSON positions are [lng, lat] with an optional altitude
        let polygon: Vec<Point2D> = shape
            .coordinates
            .first()
            .ok_or(ConfigError::MissingField("coordinates"))?
            .iter()
            .filter_map(|position| match position.as_slice() {
                [lng, lat, ..] => Some(geometry::forward(LatLng::new(*lat, *lng))),
                _ => None,
            })
            .collect();
        if polygon.len() < 3 {
            return Err(ConfigError::UnsupportedGeometry(format!(
                "polygon with {} vertices",
                polygon.len()
            )));
        }

        Ok(Self {
            name,
            floor,
            polygon,
        })
    }

    pub fn contains(&self, location: &IndoorLocation) -> bool {
        // ---
        location.floor == self.floor
            && is_inside(
                geometry::forward(LatLng::new(location.latitude, location.longitude)),
                &self.polygon,
            )
    }
}

/// All configured zones, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct AreaIndex {
    areas: Vec<Area>,
}

impl AreaIndex {
    /// Build from a GeoJSON feature collection. Anything other than a
    /// collection yields an empty index; bad features are skipped.
    pub fn from_geojson(collection: &Value) -> Self {
        // ---
        let Some(features) = collection.get("features").and_then(Value::as_array) else {
            if !collection.is_null() {
                warn!("AREAS is not a GeoJSON FeatureCollection, ignoring it");
            }
            return Self::default();
        };

        let areas: Vec<Area> = features
            .iter()
            .enumerate()
            .filter_map(|(index, feature)| match Area::from_feature(feature) {
                Ok(area) => Some(area),
                Err(e) => {
                    warn!(index, error = %e, "Area not correctly defined, skipping");
                    None
                }
            })
            .collect();

        info!("{} of {} areas registered", areas.len(), features.len());
        Self { areas }
    }

    /// Name of the first area on the location's floor that contains it.
    pub fn area_for(&self, location: &IndoorLocation) -> Option<&str> {
        self.areas
            .iter()
            .find(|area| area.contains(location))
            .map(|area| area.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}
