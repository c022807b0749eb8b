//! Two-point georeferencing of floor-plan image pixels.
//!
//! A pixel is decomposed against the segment between the two calibration
//! pixels into a parallel and a perpendicular fraction. The same fractions
//! are replayed against the Mercator projection of the two calibration
//! lat/lngs. The result is exact when image and ground differ by a
//! similarity (translation, rotation, uniform scale).

use super::{mercator, Corners, LatLng, Point2D};
use crate::error::ConfigError;

/// A pixel of a floor-plan image paired with its known ground position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub pixel: Point2D,
    pub position: LatLng,
}

impl CalibrationPoint {
    pub const fn new(pixel: Point2D, position: LatLng) -> Self {
        Self { pixel, position }
    }
}

/// Validated two-point georeference, ready to project pixels.
#[derive(Debug, Clone)]
pub struct Georeference {
    origin_pixel: Point2D,
    pixel_axis: Point2D,
    origin_planar: Point2D,
    planar_axis: Point2D,
}

impl Georeference {
    /// Build a georeference, rejecting coincident calibration points.
    pub fn new(first: CalibrationPoint, second: CalibrationPoint) -> Result<Self, ConfigError> {
        // ---
        let pixel_axis = second.pixel - first.pixel;
        if pixel_axis.length_squared() == 0.0 {
            return Err(ConfigError::CoincidentCalibration("pixel"));
        }

        let origin_planar = mercator::forward(first.position);
        let planar_axis = mercator::forward(second.position) - origin_planar;
        if planar_axis.length_squared() == 0.0 {
            return Err(ConfigError::CoincidentCalibration("lat/lng"));
        }

        Ok(Self {
            origin_pixel: first.pixel,
            pixel_axis,
            origin_planar,
            planar_axis,
        })
    }

    /// Map a floor-plan pixel to its ground position.
    pub fn project(&self, pixel: Point2D) -> LatLng {
        // ---
        let offset = pixel - self.origin_pixel;
        let norm = self.pixel_axis.length_squared();

        let parallel = self.pixel_axis.dot(offset) / norm;
        let perpendicular = self.pixel_axis.perpendicular().dot(offset) / norm;

        let planar = self.origin_planar
            + self.planar_axis * parallel
            + self.planar_axis.perpendicular() * perpendicular;

        mercator::inverse(planar)
    }

    /// Ground corners of a `width` x `height` image whose pixel origin is the
    /// bottom-left corner and whose y axis points up.
    pub fn image_corners(&self, width: f64, height: f64) -> Corners<LatLng> {
        // ---
        Corners {
            top_left: self.project(Point2D::new(0.0, height)),
            top_right: self.project(Point2D::new(width, height)),
            bottom_left: self.project(Point2D::new(0.0, 0.0)),
            bottom_right: self.project(Point2D::new(width, 0.0)),
        }
    }
}
