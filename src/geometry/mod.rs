//! Planar geometry used to move device positions between floor-plan frames.
//!
//! Everything in here is pure computation: vector arithmetic, the spherical
//! Mercator projection that gives lat/lng math a common planar frame, the
//! two-point georeference, the quad-to-quad projector and the ray-casting
//! zone test. Calibration problems (coincident points, zero-area quads) are
//! rejected when the data is loaded, never per call.

mod georeference;
mod mercator;
mod polygon;
mod quad;
mod vector;

pub use georeference::{CalibrationPoint, Georeference};
pub use mercator::{forward, inverse, LatLng, MAX_EXTENT};
pub use polygon::is_inside;
pub use quad::{Corners, QuadScale, RECTANGLE_TOLERANCE};
pub use vector::Point2D;
