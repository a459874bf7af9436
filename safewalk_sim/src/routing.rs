//! Simulated routing providers.

use crate::context::SimContext;
use async_trait::async_trait;
use safewalk_core::geometry::distance_m;
use safewalk_env::{Coordinate, EnvError, Route, RouteRequest, RoutingClient, TrackingContext};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Straight polyline from `from` to `to` with a waypoint at least every
/// `spacing_m` meters. Always contains both endpoints.
pub fn straight_polyline(from: Coordinate, to: Coordinate, spacing_m: f64) -> Vec<Coordinate> {
    let length = distance_m(&from, &to);
    let segments = if spacing_m > 0.0 {
        ((length / spacing_m).ceil() as usize).max(1)
    } else {
        1
    };

    (0..=segments)
        .map(|i| {
            let t = i as f64 / segments as f64;
            Coordinate::new(
                from.latitude + (to.latitude - from.latitude) * t,
                from.longitude + (to.longitude - from.longitude) * t,
            )
        })
        .collect()
}

/// Behavior of the simulated directions service.
#[derive(Debug, Clone)]
pub struct SimRoutingConfig {
    /// Waypoint spacing in meters (default: 5)
    pub spacing_m: f64,

    /// Virtual time each calculation takes (default: 800ms)
    pub latency: Duration,

    /// Number of calls that fail before the service recovers
    pub failures: u32,

    /// Number of successful calls (after failures) that return no waypoints
    pub empty_routes: u32,
}

impl Default for SimRoutingConfig {
    fn default() -> Self {
        Self {
            spacing_m: 5.0,
            latency: Duration::from_millis(800),
            failures: 0,
            empty_routes: 0,
        }
    }
}

/// Directions service that walks the straight line to the destination.
pub struct SimRoutingClient {
    context: Arc<SimContext>,
    config: SimRoutingConfig,

    /// Remaining (failures, empty routes) to inject
    faults: Mutex<(u32, u32)>,

    /// Every request received, in order
    requests: Mutex<Vec<RouteRequest>>,
}

impl SimRoutingClient {
    pub fn new(context: Arc<SimContext>, config: SimRoutingConfig) -> Self {
        let faults = Mutex::new((config.failures, config.empty_routes));
        Self {
            context,
            config,
            faults,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns all requests received so far.
    pub fn requests(&self) -> Vec<RouteRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl RoutingClient for SimRoutingClient {
    async fn calculate(&self, request: RouteRequest) -> Result<Route, EnvError> {
        lock(&self.requests).push(request);
        self.context.sleep(self.config.latency).await;

        {
            let mut faults = lock(&self.faults);
            if faults.0 > 0 {
                faults.0 -= 1;
                return Err(EnvError::routing("simulated directions outage"));
            }
            if faults.1 > 0 {
                faults.1 -= 1;
                return Ok(Route::new(Vec::new()));
            }
        }

        Ok(Route::new(straight_polyline(
            request.source,
            request.destination,
            self.config.spacing_m,
        )))
    }
}

type Responder = oneshot::Sender<Result<Route, EnvError>>;

/// Directions service whose answers are released by hand.
///
/// Lets a scenario deliver completions in any order it likes.
#[derive(Default)]
pub struct ManualRoutingClient {
    pending: Mutex<Vec<(RouteRequest, Responder)>>,
}

impl ManualRoutingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests waiting for an answer, oldest first.
    pub fn pending_requests(&self) -> Vec<RouteRequest> {
        lock(&self.pending).iter().map(|(r, _)| *r).collect()
    }

    /// Answers the `index`-th pending request. Returns false if there is no
    /// such request or its caller is gone.
    pub fn resolve(&self, index: usize, result: Result<Route, EnvError>) -> bool {
        let entry = {
            let mut pending = lock(&self.pending);
            if index >= pending.len() {
                return false;
            }
            pending.remove(index)
        };
        entry.1.send(result).is_ok()
    }

    /// Yields until at least `count` requests are pending.
    pub async fn wait_for_pending(&self, count: usize) {
        while lock(&self.pending).len() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl RoutingClient for ManualRoutingClient {
    async fn calculate(&self, request: RouteRequest) -> Result<Route, EnvError> {
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).push((request, tx));
        rx.await.unwrap_or(Err(EnvError::ChannelClosed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safewalk_core::geometry::nearest_waypoint_distance;

    const HOME: Coordinate = Coordinate::new(52.3850, 13.1150);
    const DESTINATION: Coordinate = Coordinate::new(52.3918, 13.1227);

    #[test]
    fn test_straight_polyline_spacing() {
        let line = straight_polyline(HOME, DESTINATION, 5.0);

        assert_eq!(line.first(), Some(&HOME));
        assert_eq!(line.last(), Some(&DESTINATION));
        for pair in line.windows(2) {
            assert!(distance_m(&pair[0], &pair[1]) <= 5.0 + 1e-3);
        }
    }

    #[test]
    fn test_straight_polyline_degenerate() {
        let line = straight_polyline(HOME, HOME, 5.0);
        assert_eq!(line, vec![HOME, HOME]);
    }

    #[tokio::test]
    async fn test_sim_routing_injects_faults_in_order() {
        let ctx = SimContext::shared(1);
        let client = SimRoutingClient::new(
            ctx.clone(),
            SimRoutingConfig {
                failures: 1,
                empty_routes: 1,
                ..Default::default()
            },
        );
        let request = RouteRequest::walking(HOME, DESTINATION);

        assert!(client.calculate(request).await.is_err());
        assert!(client.calculate(request).await.unwrap().is_empty());

        let route = client.calculate(request).await.unwrap();
        assert!(route.len() > 2);
        assert_eq!(nearest_waypoint_distance(&HOME, route.waypoints()), Some(0.0));

        assert_eq!(client.requests().len(), 3);
        assert_eq!(ctx.now(), Duration::from_millis(2400));
    }

    #[tokio::test]
    async fn test_manual_routing_resolves_out_of_order() {
        let client = Arc::new(ManualRoutingClient::new());
        let a = RouteRequest::walking(HOME, DESTINATION);
        let b = RouteRequest::walking(DESTINATION, HOME);

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.calculate(a).await }
        });
        client.wait_for_pending(1).await;
        let second = tokio::spawn({
            let client = client.clone();
            async move { client.calculate(b).await }
        });
        client.wait_for_pending(2).await;

        assert_eq!(client.pending_requests(), vec![a, b]);
        assert!(client.resolve(1, Ok(Route::new(vec![DESTINATION]))));
        assert!(client.resolve(0, Err(EnvError::NoRouteFound)));
        assert!(!client.resolve(0, Err(EnvError::NoRouteFound)));

        assert_eq!(second.await.unwrap().unwrap().len(), 1);
        assert_eq!(first.await.unwrap(), Err(EnvError::NoRouteFound));
    }
}
