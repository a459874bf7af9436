//! Error types for the tracking core.

use safewalk_env::EnvError;
use thiserror::Error;

/// Errors raised while tracking.
///
/// None of these are fatal to a running session: the session logs them
/// and keeps processing events.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// Position is non-finite or out of range
    #[error("Invalid coordinate: lat={latitude}, lng={longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// The routing provider failed or found no route
    #[error("Route calculation failed: {0}")]
    RouteCalculationFailed(EnvError),

    /// The location provider could not be set up
    #[error("Location unavailable: {0}")]
    LocationUnavailable(EnvError),

    /// A calculation succeeded with zero waypoints
    #[error("Route has no waypoints")]
    EmptyRoute,

    /// Configuration values are out of range
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl TrackingError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TrackingError>;
