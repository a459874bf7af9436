//! Tracking configuration.
//!
//! Defaults reproduce the hard-wired values of the first prototype: a 10 m
//! deviation tolerance, a zero-radius school geofence and the fixed
//! destination / school coordinates.

use crate::error::{Result, TrackingError};
use safewalk_env::Coordinate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How adherence to the route is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdherenceMode {
    /// Distance to the nearest waypoint. Coarse on long straight segments.
    #[default]
    Waypoint,

    /// Distance to the nearest point on any route segment.
    Segment,
}

/// How the two resting triggers (distance check, geofence events) combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestingPolicy {
    /// Both triggers drive the resting signal; only the distance check
    /// writes the inside-safe-region flag.
    #[default]
    Independent,

    /// A single inside-safe-region flag, written by whichever trigger
    /// fired last. The resting signal follows the flag.
    Unified,
}

/// Which route completions are allowed to replace the current route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessPolicy {
    /// Only the most recently issued request may apply. Superseded
    /// in-flight calculations are aborted.
    #[default]
    LatestIssued,

    /// Any completion newer than the last applied one may apply.
    NewerThanApplied,
}

/// Configuration for a tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Deviation tolerance in meters (default: 10)
    pub allowed_distance_m: f64,

    /// Safe-region radius in meters (default: 0, exact match only)
    pub geofence_distance_m: f64,

    /// Where the child is walking to
    pub destination: Coordinate,

    /// Center of the safe region (the school)
    pub safe_region_center: Coordinate,

    /// Identifier registered with the location provider
    pub safe_region_id: String,

    /// Visible radius when recentering the map (default: 500)
    pub map_region_radius_m: f64,

    /// Route adherence measure (default: waypoint)
    pub adherence: AdherenceMode,

    /// Resting trigger reconciliation (default: independent)
    pub resting_policy: RestingPolicy,

    /// Stale route completion handling (default: latest issued)
    pub staleness: StalenessPolicy,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            allowed_distance_m: 10.0,
            geofence_distance_m: 0.0,
            destination: Coordinate::new(52.3918, 13.1227),
            safe_region_center: Coordinate::new(52.3890, 13.1195),
            safe_region_id: "school".to_string(),
            map_region_radius_m: 500.0,
            adherence: AdherenceMode::Waypoint,
            resting_policy: RestingPolicy::Independent,
            staleness: StalenessPolicy::LatestIssued,
        }
    }
}

impl TrackingConfig {
    /// Parses and validates a JSON configuration. Missing fields take
    /// their default values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks that distances are finite and non-negative and that
    /// coordinates are valid.
    pub fn validate(&self) -> Result<()> {
        let distances = [
            ("allowed_distance_m", self.allowed_distance_m),
            ("geofence_distance_m", self.geofence_distance_m),
            ("map_region_radius_m", self.map_region_radius_m),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(TrackingError::config(format!(
                    "{} must be a non-negative finite distance, got {}",
                    name, value
                )));
            }
        }

        if !self.destination.is_valid() {
            return Err(TrackingError::config(format!(
                "destination {} is not a valid coordinate",
                self.destination
            )));
        }
        if !self.safe_region_center.is_valid() {
            return Err(TrackingError::config(format!(
                "safe_region_center {} is not a valid coordinate",
                self.safe_region_center
            )));
        }
        if self.safe_region_id.is_empty() {
            return Err(TrackingError::config("safe_region_id must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_prototype() {
        let config = TrackingConfig::default();
        assert_eq!(config.allowed_distance_m, 10.0);
        assert_eq!(config.geofence_distance_m, 0.0);
        assert_eq!(config.destination, Coordinate::new(52.3918, 13.1227));
        assert_eq!(config.safe_region_center, Coordinate::new(52.3890, 13.1195));
        assert_eq!(config.adherence, AdherenceMode::Waypoint);
        assert_eq!(config.resting_policy, RestingPolicy::Independent);
        assert_eq!(config.staleness, StalenessPolicy::LatestIssued);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = TrackingConfig::from_json_str(
            r#"{ "allowed_distance_m": 25.0, "resting_policy": "unified" }"#,
        )
        .unwrap();

        assert_eq!(config.allowed_distance_m, 25.0);
        assert_eq!(config.resting_policy, RestingPolicy::Unified);
        assert_eq!(config.geofence_distance_m, 0.0);
        assert_eq!(config.safe_region_id, "school");
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let result = TrackingConfig::from_json_str(r#"{ "allowed_distance_m": -1.0 }"#);
        assert!(matches!(result, Err(TrackingError::Config(_))));
    }

    #[test]
    fn test_invalid_destination_rejected() {
        let result = TrackingConfig::from_json_str(
            r#"{ "destination": { "latitude": 123.0, "longitude": 13.0 } }"#,
        );
        assert!(matches!(result, Err(TrackingError::Config(_))));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let result = TrackingConfig::from_json_str("{ allowed_distance_m: ");
        assert!(matches!(result, Err(TrackingError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = TrackingConfig::load("/nonexistent/safewalk.json");
        assert!(matches!(result, Err(TrackingError::Io(_))));
    }
}
