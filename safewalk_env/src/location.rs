//! Location provider abstraction.

use crate::error::EnvError;
use crate::types::Coordinate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An event delivered by the platform location service.
///
/// Region events arrive on a separate channel from plain position
/// updates; they are not derived from polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocationEvent {
    /// A fresh position fix
    Position(Coordinate),

    /// The device entered the monitored region with this identifier
    RegionEntered(String),

    /// The device left the monitored region with this identifier
    RegionExited(String),
}

/// Source of position fixes and geofence transitions.
///
/// Permission handling happens before the first event is delivered. A
/// provider that cannot deliver (missing permission, no signal) simply
/// produces no events.
///
/// # Implementations
///
/// - **Production**: platform location manager bridge
/// - **Simulation**: channel fed by the scenario walker
#[async_trait]
pub trait LocationProvider: Send + Sync + 'static {
    /// Receives the next location event.
    ///
    /// # Returns
    /// * `Some(event)` - An event was delivered
    /// * `None` - Tracking stopped (provider shut down)
    ///
    /// Must be cancel-safe: it is polled inside `tokio::select!`.
    async fn next_event(&self) -> Option<LocationEvent>;

    /// Registers a circular region for entry/exit notifications.
    async fn monitor_region(
        &self,
        id: &str,
        center: Coordinate,
        radius_m: f64,
    ) -> Result<(), EnvError>;
}
