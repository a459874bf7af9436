//! Simulated location provider.

use async_trait::async_trait;
use safewalk_env::{Coordinate, EnvError, LocationEvent, LocationProvider};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A region registered through `monitor_region`.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredRegion {
    pub id: String,
    pub center: Coordinate,
    pub radius_m: f64,
}

/// Location provider fed by the scenario through a channel.
///
/// Dropping every `LocationFeed` ends the event stream, which stops the
/// session.
pub struct ScriptedLocationProvider {
    /// Incoming events (behind tokio mutex for async)
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<LocationEvent>>>,

    /// Regions the session asked us to monitor
    regions: Mutex<Vec<MonitoredRegion>>,

    /// Reject region registration (no geofencing permission)
    deny_regions: bool,
}

/// Sending half of a `ScriptedLocationProvider`.
#[derive(Clone)]
pub struct LocationFeed {
    tx: mpsc::UnboundedSender<LocationEvent>,
}

impl LocationFeed {
    /// Queues an event. Returns false once the provider is gone.
    pub fn push(&self, event: LocationEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn position(&self, position: Coordinate) -> bool {
        self.push(LocationEvent::Position(position))
    }
}

impl ScriptedLocationProvider {
    /// Creates a provider and the feed that drives it.
    pub fn new() -> (LocationFeed, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = Self {
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            regions: Mutex::new(Vec::new()),
            deny_regions: false,
        };
        (LocationFeed { tx }, provider)
    }

    /// Makes `monitor_region` fail as if geofencing were not permitted.
    pub fn denying_regions(mut self) -> Self {
        self.deny_regions = true;
        self
    }

    /// Regions registered so far.
    pub fn regions(&self) -> Vec<MonitoredRegion> {
        self.regions
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LocationProvider for ScriptedLocationProvider {
    async fn next_event(&self) -> Option<LocationEvent> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    async fn monitor_region(
        &self,
        id: &str,
        center: Coordinate,
        radius_m: f64,
    ) -> Result<(), EnvError> {
        if self.deny_regions {
            return Err(EnvError::PermissionDenied);
        }
        if let Ok(mut regions) = self.regions.lock() {
            regions.push(MonitoredRegion {
                id: id.to_string(),
                center,
                radius_m,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_feed_delivers_in_order_then_ends() {
        let (feed, provider) = ScriptedLocationProvider::new();
        let p = Coordinate::new(52.0, 13.0);

        assert!(feed.position(p));
        assert!(feed.push(LocationEvent::RegionEntered("school".into())));
        drop(feed);

        assert_eq!(provider.next_event().await, Some(LocationEvent::Position(p)));
        assert_eq!(
            provider.next_event().await,
            Some(LocationEvent::RegionEntered("school".into()))
        );
        assert_eq!(provider.next_event().await, None);
    }

    #[tokio::test]
    async fn test_region_registration() {
        let (_feed, provider) = ScriptedLocationProvider::new();
        let center = Coordinate::new(52.3890, 13.1195);

        provider.monitor_region("school", center, 0.0).await.unwrap();
        assert_eq!(provider.regions()[0].id, "school");

        let (_feed, denied) = ScriptedLocationProvider::new();
        let denied = denied.denying_regions();
        assert_eq!(
            denied.monitor_region("school", center, 0.0).await,
            Err(EnvError::PermissionDenied)
        );
    }
}
