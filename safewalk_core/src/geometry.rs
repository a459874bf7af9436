//! Distances on the earth's surface.
//!
//! Great-circle distances come from `geo`'s haversine implementation.
//! Segment distances use a local equirectangular projection around the
//! query point, which is accurate at walking scale.

use geo::{HaversineDistance, Point};
use safewalk_env::Coordinate;

/// Mean earth radius in meters (matches `geo`'s haversine radius).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

fn to_point(c: &Coordinate) -> Point<f64> {
    Point::new(c.longitude, c.latitude)
}

/// Great-circle distance between two coordinates in meters.
pub fn distance_m(a: &Coordinate, b: &Coordinate) -> f64 {
    to_point(a).haversine_distance(&to_point(b))
}

/// Returns the coordinate displaced by the given meters north and east.
pub fn offset_m(origin: &Coordinate, north_m: f64, east_m: f64) -> Coordinate {
    let dlat = north_m / EARTH_RADIUS_M;
    let dlng = east_m / (EARTH_RADIUS_M * origin.latitude.to_radians().cos());
    Coordinate::new(
        origin.latitude + dlat.to_degrees(),
        origin.longitude + dlng.to_degrees(),
    )
}

/// Distance from `position` to the closest waypoint, or `None` when there
/// are no waypoints.
pub fn nearest_waypoint_distance(position: &Coordinate, waypoints: &[Coordinate]) -> Option<f64> {
    waypoints
        .iter()
        .map(|w| distance_m(position, w))
        .fold(None, |best, d| match best {
            Some(b) if b <= d => Some(b),
            _ => Some(d),
        })
}

/// Distance from `position` to the closest point on the polyline through
/// `waypoints`, or `None` when there are no waypoints.
///
/// A single waypoint degenerates to point distance.
pub fn nearest_segment_distance(position: &Coordinate, waypoints: &[Coordinate]) -> Option<f64> {
    match waypoints {
        [] => None,
        [only] => Some(distance_m(position, only)),
        _ => waypoints
            .windows(2)
            .map(|pair| segment_distance(position, &pair[0], &pair[1]))
            .fold(None, |best, d| match best {
                Some(b) if b <= d => Some(b),
                _ => Some(d),
            }),
    }
}

/// Projects `c` to local meters (east, north) relative to `origin`.
fn to_local(origin: &Coordinate, c: &Coordinate) -> (f64, f64) {
    let lat_diff = (c.latitude - origin.latitude).to_radians();
    let lon_diff = (c.longitude - origin.longitude).to_radians();

    let x = lon_diff * EARTH_RADIUS_M * origin.latitude.to_radians().cos();
    let y = lat_diff * EARTH_RADIUS_M;
    (x, y)
}

fn segment_distance(position: &Coordinate, a: &Coordinate, b: &Coordinate) -> f64 {
    // Position is the projection origin, so it sits at (0, 0).
    let (ax, ay) = to_local(position, a);
    let (bx, by) = to_local(position, b);

    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance_m(position, a);
    }

    let t = (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0);
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (cx * cx + cy * cy).sqrt()
}
