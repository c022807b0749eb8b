//! Even-odd ray-casting zone membership.

use super::Point2D;

/// True when `point` lies inside the implicitly closed `polygon`.
///
/// Edges follow the half-open rule `(yi > y) != (yj > y)`, so a vertex
/// shared by two edges is counted once.
pub fn is_inside(point: Point2D, polygon: &[Point2D]) -> bool {
    // ---
    let Some(mut previous) = polygon.last().copied() else {
        return false;
    };

    let mut inside = false;
    for &current in polygon {
        if (current.y > point.y) != (previous.y > point.y) {
            let crossing_x = (previous.x - current.x) * (point.y - current.y)
                / (previous.y - current.y)
                + current.x;
            if point.x < crossing_x {
                inside = !inside;
            }
        }
        previous = current;
    }

    inside
}
