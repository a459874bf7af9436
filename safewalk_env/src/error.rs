//! Error types for the SafeWalk environment abstraction.

use thiserror::Error;

/// Errors reported by external collaborators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    /// The directions service returned an error
    #[error("Route calculation failed: {0}")]
    RouteCalculationFailed(String),

    /// The directions service answered without any route
    #[error("No route found")]
    NoRouteFound,

    /// Location services cannot deliver updates
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    /// The user has not granted location access
    #[error("Location permission denied")]
    PermissionDenied,

    /// An internal channel was closed (shutdown)
    #[error("Channel closed")]
    ChannelClosed,

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a routing failure.
    pub fn routing(msg: impl Into<String>) -> Self {
        Self::RouteCalculationFailed(msg.into())
    }
}
