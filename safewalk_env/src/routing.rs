//! Directions service abstraction.

use crate::error::EnvError;
use crate::types::{Route, RouteRequest};
use async_trait::async_trait;

/// Computes walking routes between two coordinates.
///
/// # Returns
/// * `Ok(route)` - The first (and only, `alternatives = false`) route
/// * `Err(EnvError::NoRouteFound)` - The service answered without a route
/// * `Err(EnvError::RouteCalculationFailed)` - The service failed
///
/// # Note
/// A well-behaved service never returns an empty route. Callers still
/// have to cope with one.
#[async_trait]
pub trait RoutingClient: Send + Sync + 'static {
    async fn calculate(&self, request: RouteRequest) -> Result<Route, EnvError>;
}
