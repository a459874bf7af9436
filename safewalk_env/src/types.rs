//! Common types for the SafeWalk environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a new coordinate.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Returns true if both components are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// An ordered walking path produced by a routing provider.
///
/// Routes are immutable once produced. Recalculation replaces the whole
/// route rather than editing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    waypoints: Vec<Coordinate>,
}

impl Route {
    /// Creates a route from its ordered waypoints.
    pub fn new(waypoints: Vec<Coordinate>) -> Self {
        Self { waypoints }
    }

    /// Returns the ordered waypoints.
    pub fn waypoints(&self) -> &[Coordinate] {
        &self.waypoints
    }

    /// Number of waypoints.
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// First waypoint, if any.
    pub fn start(&self) -> Option<Coordinate> {
        self.waypoints.first().copied()
    }

    /// Last waypoint, if any.
    pub fn end(&self) -> Option<Coordinate> {
        self.waypoints.last().copied()
    }
}

/// How the route is travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    #[default]
    Walking,
}

/// A directions request sent to a `RoutingClient`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Where the route starts (the child's position)
    pub source: Coordinate,

    /// Where the route ends
    pub destination: Coordinate,

    /// Transport mode
    pub mode: TransportMode,

    /// Whether alternate routes may be returned
    pub alternatives: bool,
}

impl RouteRequest {
    /// Creates a walking request without alternatives.
    pub fn walking(source: Coordinate, destination: Coordinate) -> Self {
        Self {
            source,
            destination,
            mode: TransportMode::Walking,
            alternatives: false,
        }
    }
}

/// Identifies one tracking session in logs and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Same seed, same id, so replays log identically.
    pub fn from_seed(seed: u64) -> Self {
        Self(Uuid::from_u64_pair(seed, seed.rotate_left(32) ^ 0x5afe_3a1c_0000_0000))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (head, ..) = self.0.as_fields();
        write!(f, "{:08x}", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validity() {
        assert!(Coordinate::new(52.3918, 13.1227).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 13.0).is_valid());
        assert!(!Coordinate::new(52.0, f64::INFINITY).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
    }

    #[test]
    fn test_route_accessors() {
        let a = Coordinate::new(52.0, 13.0);
        let b = Coordinate::new(52.1, 13.1);
        let route = Route::new(vec![a, b]);

        assert_eq!(route.len(), 2);
        assert_eq!(route.start(), Some(a));
        assert_eq!(route.end(), Some(b));

        let empty = Route::new(Vec::new());
        assert!(empty.is_empty());
        assert_eq!(empty.start(), None);
    }

    #[test]
    fn test_walking_request_defaults() {
        let req = RouteRequest::walking(Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 4.0));
        assert_eq!(req.mode, TransportMode::Walking);
        assert!(!req.alternatives);
    }

    #[test]
    fn test_session_id_from_seed_is_deterministic() {
        assert_eq!(SessionId::from_seed(7), SessionId::from_seed(7));
        assert_ne!(SessionId::from_seed(7), SessionId::from_seed(8));
        assert_eq!(SessionId::from_seed(7).to_string().len(), 8);
    }
}
