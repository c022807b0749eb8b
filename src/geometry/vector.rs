//! 2D vector arithmetic.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A planar point or displacement. The unit depends on the frame: image
/// pixels for georeferencing, projected Mercator meters everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Point2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// 2D cross product (z component), twice the signed triangle area.
    pub fn cross(self, other: Point2D) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// The vector rotated by -90°: `(x, y) -> (y, -x)`.
    pub fn perpendicular(self) -> Point2D {
        Point2D::new(self.y, -self.x)
    }

    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unsigned angle in radians between two vectors.
    ///
    /// The cosine is clamped to `[-1, 1]` so nearly parallel vectors do not
    /// produce `NaN` from rounding. Zero-length input yields `NaN`; callers
    /// validate their vectors at load time.
    pub fn angle_between(self, other: Point2D) -> f64 {
        let cos = self.dot(other) / (self.length() * other.length());
        cos.clamp(-1.0, 1.0).acos()
    }

    pub fn midpoint(self, other: Point2D) -> Point2D {
        (self + other) * 0.5
    }
}

impl Add for Point2D {
    type Output = Point2D;

    fn add(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2D {
    type Output = Point2D;

    fn sub(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2D {
    type Output = Point2D;

    fn mul(self, scalar: f64) -> Point2D {
        Point2D::new(self.x * scalar, self.y * scalar)
    }
}
