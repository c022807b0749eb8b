//! Spherical (web) Mercator forward and inverse projection.
//!
//! Projected coordinates are EPSG:3857 meters. This is a local-scale planar
//! approximation: distances are only meaningful across a venue, not across
//! the globe.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use serde::{Deserialize, Serialize};

use super::Point2D;

/// Earth radius used by the spherical Mercator projection.
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the width of the projected world; both axes are clamped to it.
pub const MAX_EXTENT: f64 = 20_037_508.342_789_244;

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Project a lat/lng to planar meters.
pub fn forward(position: LatLng) -> Point2D {
    // ---
    let x = EARTH_RADIUS * position.lng.to_radians();
    let y = EARTH_RADIUS * (FRAC_PI_4 + 0.5 * position.lat.to_radians()).tan().ln();

    Point2D::new(
        x.clamp(-MAX_EXTENT, MAX_EXTENT),
        y.clamp(-MAX_EXTENT, MAX_EXTENT),
    )
}

/// Inverse of [`forward`].
pub fn inverse(point: Point2D) -> LatLng {
    // ---
    let lng = (point.x / EARTH_RADIUS).to_degrees();
    let lat = (FRAC_PI_2 - 2.0 * (-point.y / EARTH_RADIUS).exp().atan()).to_degrees();

    LatLng::new(lat, lng)
}
