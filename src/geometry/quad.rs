//! Quad-to-quad projection between calibration frames.
//!
//! A point is expressed as fractions along the quad's bottom edge and left
//! edge (two independent 1-D projections from the bottom-left corner), then
//! rebuilt from the same fractions on a second quad. Independent projections
//! are exact when those two edges are orthogonal, i.e. for rectangles in the
//! planar frame; calibration quads are near-rectangular floor outlines.
//! Fractions outside `[0, 1]` are valid and simply land outside the quad.

use super::{mercator, LatLng, Point2D};
use crate::error::ConfigError;

/// Relative diagonal mismatch above which a calibration quad is reported as
/// too far from a rectangle for the projector.
pub const RECTANGLE_TOLERANCE: f64 = 0.01;

/// Relative cross product below which two edges are considered collinear.
const COLLINEAR_EPSILON: f64 = 1e-9;

/// The four calibration corners of a floor plan.
///
/// Field order mirrors the configuration order (top-left, top-right,
/// bottom-left, bottom-right); [`Corners::from_ordered`] is the only
/// constructor from unlabeled data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corners<T> {
    pub top_left: T,
    pub top_right: T,
    pub bottom_left: T,
    pub bottom_right: T,
}

impl<T: Copy> Corners<T> {
    /// Build from a slice in `[top_left, top_right, bottom_left, bottom_right]`
    /// order. Returns `None` unless exactly four values are given.
    pub fn from_ordered(values: &[T]) -> Option<Self> {
        // ---
        match values {
            [top_left, top_right, bottom_left, bottom_right] => Some(Self {
                top_left: *top_left,
                top_right: *top_right,
                bottom_left: *bottom_left,
                bottom_right: *bottom_right,
            }),
            _ => None,
        }
    }

    pub fn to_ordered(&self) -> [T; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }

    pub fn map<U>(&self, f: impl Fn(T) -> U) -> Corners<U> {
        Corners {
            top_left: f(self.top_left),
            top_right: f(self.top_right),
            bottom_left: f(self.bottom_left),
            bottom_right: f(self.bottom_right),
        }
    }
}

impl Corners<LatLng> {
    /// Project every corner into the planar Mercator frame.
    pub fn to_planar(&self) -> Corners<Point2D> {
        self.map(mercator::forward)
    }
}

/// Fractional position of a point along a quad's bottom edge (`width`) and
/// left edge (`height`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadScale {
    pub width: f64,
    pub height: f64,
}

impl Corners<Point2D> {
    fn bottom_edge(&self) -> Point2D {
        self.bottom_right - self.bottom_left
    }

    fn left_edge(&self) -> Point2D {
        self.top_left - self.bottom_left
    }

    /// Reject quads the projector cannot divide by: zero-length edges or
    /// collinear bottom/left edges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // ---
        let bottom = self.bottom_edge();
        let left = self.left_edge();

        if bottom.length_squared() == 0.0 {
            return Err(ConfigError::DegenerateQuad(
                "bottom-left and bottom-right corners coincide".into(),
            ));
        }
        if left.length_squared() == 0.0 {
            return Err(ConfigError::DegenerateQuad(
                "bottom-left and top-left corners coincide".into(),
            ));
        }
        if bottom.cross(left).abs() <= COLLINEAR_EPSILON * bottom.length() * left.length() {
            return Err(ConfigError::DegenerateQuad(
                "bottom and left edges are collinear".into(),
            ));
        }

        Ok(())
    }

    /// How far the quad is from a rectangle, relative to its mean diagonal.
    ///
    /// Takes the larger of the diagonal length difference (non-zero for a
    /// slanted parallelogram) and the distance between diagonal midpoints
    /// (non-zero when the quad is not a parallelogram). Zero for a rectangle.
    pub fn rectangle_skew(&self) -> f64 {
        // ---
        let first = self.top_left - self.bottom_right;
        let second = self.top_right - self.bottom_left;
        let mean_diagonal = (first.length() + second.length()) / 2.0;

        let length_gap = (first.length() - second.length()).abs();
        let midpoint_gap = (self.top_left.midpoint(self.bottom_right)
            - self.top_right.midpoint(self.bottom_left))
        .length();

        length_gap.max(midpoint_gap) / mean_diagonal
    }

    /// Interior angle at the bottom-left corner, in degrees.
    pub fn bottom_left_angle(&self) -> f64 {
        self.bottom_edge().angle_between(self.left_edge()).to_degrees()
    }

    /// Decompose `point` into fractions of this quad's edges.
    pub fn scale_of(&self, point: Point2D) -> QuadScale {
        // ---
        let offset = point - self.bottom_left;
        let bottom = self.bottom_edge();
        let left = self.left_edge();

        QuadScale {
            width: bottom.dot(offset) / bottom.length_squared(),
            height: left.dot(offset) / left.length_squared(),
        }
    }

    /// Rebuild a point from edge fractions on this quad.
    pub fn project_scale(&self, scale: QuadScale) -> Point2D {
        self.bottom_left + self.bottom_edge() * scale.width + self.left_edge() * scale.height
    }

    /// Carry `point` from this quad's frame into `target`'s frame.
    pub fn project_onto(&self, point: Point2D, target: &Corners<Point2D>) -> Point2D {
        target.project_scale(self.scale_of(point))
    }
}
