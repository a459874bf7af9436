//! The school safe region.

use crate::config::TrackingConfig;
use crate::geometry::distance_m;
use safewalk_env::Coordinate;
use serde::{Deserialize, Serialize};

/// A circular region around the school.
///
/// With the default zero threshold only an exact position match counts as
/// inside; in practice the geofence events from the location provider are
/// what mark arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeRegion {
    /// Identifier registered with the location provider
    pub id: String,

    /// Region center
    pub center: Coordinate,

    /// Inside iff distance to center is at most this many meters
    pub threshold_m: f64,
}

impl SafeRegion {
    pub fn new(id: impl Into<String>, center: Coordinate, threshold_m: f64) -> Self {
        Self {
            id: id.into(),
            center,
            threshold_m,
        }
    }

    /// Builds the region described by a tracking configuration.
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(
            config.safe_region_id.clone(),
            config.safe_region_center,
            config.geofence_distance_m,
        )
    }

    /// Distance from `position` to the region center in meters.
    pub fn distance_to(&self, position: &Coordinate) -> f64 {
        distance_m(&self.center, position)
    }

    pub fn contains(&self, position: &Coordinate) -> bool {
        self.distance_to(position) <= self.threshold_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::offset_m;

    #[test]
    fn test_zero_threshold_is_exact_match() {
        let region = SafeRegion::new("school", Coordinate::new(52.3890, 13.1195), 0.0);

        assert!(region.contains(&Coordinate::new(52.3890, 13.1195)));
        assert!(!region.contains(&offset_m(&region.center, 0.5, 0.0)));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let center = Coordinate::new(52.3890, 13.1195);
        let region = SafeRegion::new("school", center, 50.0);

        assert!(region.contains(&offset_m(&center, 49.0, 0.0)));
        assert!(!region.contains(&offset_m(&center, 51.0, 0.0)));
    }

    #[test]
    fn test_from_config() {
        let config = TrackingConfig::default();
        let region = SafeRegion::from_config(&config);

        assert_eq!(region.id, "school");
        assert_eq!(region.center, config.safe_region_center);
        assert_eq!(region.threshold_m, 0.0);
    }
}
