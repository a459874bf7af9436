//! Safe-region classification and signal routing.
//!
//! The tracker sits in front of the `RouteMonitor`: it classifies each
//! position against the school region, forwards it to the monitor and
//! turns both results into presentation signals.
//!
//! Two independent triggers drive the resting indicator: the per-position
//! distance check and the provider's geofence entry/exit events. How they
//! combine is set by `RestingPolicy`.

use crate::config::{RestingPolicy, TrackingConfig};
use crate::error::{Result, TrackingError};
use crate::region::SafeRegion;
use crate::route_monitor::{DeviationResult, MonitorOutcome, RouteMonitor};
use crate::signals::{PresentationSignal, VisibilityLatch};
use safewalk_env::Coordinate;
use tracing::{debug, info};

/// Result of one position update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackerOutcome {
    /// Distance check result for this position
    pub inside_safe_region: bool,

    /// What the route monitor decided
    pub monitor: MonitorOutcome,

    /// Signals for the presentation layer, in emission order
    pub signals: Vec<PresentationSignal>,
}

/// Classifies positions against the safe region.
#[derive(Debug, Clone)]
pub struct LocationTracker {
    region: SafeRegion,
    policy: RestingPolicy,
    map_region_radius_m: f64,

    /// Authoritative inside flag (distance check; also geofence events
    /// under `RestingPolicy::Unified`)
    is_user_in_safe_region: bool,

    alert: VisibilityLatch,
    resting: VisibilityLatch,
}

impl LocationTracker {
    pub fn new(region: SafeRegion) -> Self {
        Self {
            region,
            policy: RestingPolicy::default(),
            map_region_radius_m: 500.0,
            is_user_in_safe_region: false,
            alert: VisibilityLatch::hidden(),
            resting: VisibilityLatch::hidden(),
        }
    }

    pub fn from_config(config: &TrackingConfig) -> Self {
        let mut tracker =
            Self::new(SafeRegion::from_config(config)).with_policy(config.resting_policy);
        tracker.map_region_radius_m = config.map_region_radius_m;
        tracker
    }

    /// Sets the resting trigger policy.
    pub fn with_policy(mut self, policy: RestingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Handles a position update and forwards it to `monitor`.
    ///
    /// Order of emitted signals: recenter, resting rising edge (with alert
    /// hidden), alert from the route verdict, resting withdrawal.
    pub fn on_position_update(
        &mut self,
        position: Coordinate,
        monitor: &mut RouteMonitor,
    ) -> Result<TrackerOutcome> {
        if !position.is_valid() {
            return Err(TrackingError::InvalidCoordinate {
                latitude: position.latitude,
                longitude: position.longitude,
            });
        }

        let mut signals = vec![PresentationSignal::CenterOn(position, self.map_region_radius_m)];

        let inside = self.region.contains(&position);
        if inside != self.is_user_in_safe_region {
            info!(
                "{} safe region '{}' (distance {:.1}m)",
                if inside { "Inside" } else { "Outside" },
                self.region.id,
                self.region.distance_to(&position)
            );
        }
        self.is_user_in_safe_region = inside;

        // Rising edge only: nothing is sent while the indicator already shows
        if inside && !self.resting.is_visible() {
            self.show_resting(&mut signals);
        }

        let outcome = monitor.on_position_update(position)?;
        match outcome.verdict {
            Some(DeviationResult::OffRoute) => self.set_alert(true, &mut signals),
            Some(DeviationResult::OnRoute) => self.set_alert(false, &mut signals),
            None => {}
        }

        if !inside {
            if let Some(v) = self.resting.set(false) {
                signals.push(PresentationSignal::RestingVisible(v));
            }
        }

        Ok(TrackerOutcome {
            inside_safe_region: inside,
            monitor: outcome,
            signals,
        })
    }

    /// Handles a geofence entry event.
    ///
    /// Events for other regions are ignored.
    pub fn on_region_entered(&mut self, region_id: &str) -> Vec<PresentationSignal> {
        let mut signals = Vec::new();
        if region_id != self.region.id {
            debug!("Ignoring entry into unknown region '{}'", region_id);
            return signals;
        }

        info!("Entered region '{}'", region_id);
        match self.policy {
            RestingPolicy::Independent => {
                if let Some(v) = self.resting.set(true) {
                    signals.push(PresentationSignal::RestingVisible(v));
                }
            }
            RestingPolicy::Unified => {
                self.is_user_in_safe_region = true;
                if !self.resting.is_visible() {
                    self.show_resting(&mut signals);
                }
            }
        }
        signals
    }

    /// Handles a geofence exit event.
    pub fn on_region_exited(&mut self, region_id: &str) -> Vec<PresentationSignal> {
        let mut signals = Vec::new();
        if region_id != self.region.id {
            debug!("Ignoring exit from unknown region '{}'", region_id);
            return signals;
        }

        info!("Exited region '{}'", region_id);
        if self.policy == RestingPolicy::Unified {
            self.is_user_in_safe_region = false;
        }
        if let Some(v) = self.resting.set(false) {
            signals.push(PresentationSignal::RestingVisible(v));
        }
        signals
    }

    fn show_resting(&mut self, signals: &mut Vec<PresentationSignal>) {
        if let Some(v) = self.resting.set(true) {
            signals.push(PresentationSignal::RestingVisible(v));
        }
        self.set_alert(false, signals);
    }

    fn set_alert(&mut self, visible: bool, signals: &mut Vec<PresentationSignal>) {
        if let Some(v) = self.alert.set(visible) {
            signals.push(PresentationSignal::AlertVisible(v));
        }
    }

    pub fn region(&self) -> &SafeRegion {
        &self.region
    }

    pub fn is_user_in_safe_region(&self) -> bool {
        self.is_user_in_safe_region
    }

    pub fn is_alert_visible(&self) -> bool {
        self.alert.is_visible()
    }

    pub fn is_resting_visible(&self) -> bool {
        self.resting.is_visible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::offset_m;
    use crate::route_monitor::RouteUpdate;
    use safewalk_env::Route;

    const SCHOOL: Coordinate = Coordinate::new(52.3890, 13.1195);
    const DESTINATION: Coordinate = Coordinate::new(52.3918, 13.1227);

    fn setup(policy: RestingPolicy) -> (LocationTracker, RouteMonitor) {
        let tracker =
            LocationTracker::new(SafeRegion::new("school", SCHOOL, 0.0)).with_policy(policy);
        (tracker, RouteMonitor::new(DESTINATION, 10.0))
    }

    fn resting_signals(signals: &[PresentationSignal]) -> Vec<bool> {
        signals
            .iter()
            .filter_map(|s| match s {
                PresentationSignal::RestingVisible(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    fn alert_signals(signals: &[PresentationSignal]) -> Vec<bool> {
        signals
            .iter()
            .filter_map(|s| match s {
                PresentationSignal::AlertVisible(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_every_update_recenters_map() {
        let (mut tracker, mut monitor) = setup(RestingPolicy::Independent);
        let p = offset_m(&SCHOOL, 100.0, 0.0);

        let outcome = tracker.on_position_update(p, &mut monitor).unwrap();
        assert_eq!(outcome.signals[0], PresentationSignal::CenterOn(p, 500.0));
        assert!(!outcome.inside_safe_region);
    }

    #[test]
    fn test_resting_shown_only_on_rising_edge() {
        let (mut tracker, mut monitor) = setup(RestingPolicy::Independent);

        let first = tracker.on_position_update(SCHOOL, &mut monitor).unwrap();
        let second = tracker.on_position_update(SCHOOL, &mut monitor).unwrap();

        assert!(first.inside_safe_region);
        assert_eq!(resting_signals(&first.signals), vec![true]);
        assert!(resting_signals(&second.signals).is_empty());
        assert!(tracker.is_resting_visible());
    }

    #[test]
    fn test_position_update_forwards_regardless_of_region() {
        let (mut tracker, mut monitor) = setup(RestingPolicy::Independent);

        let outcome = tracker.on_position_update(SCHOOL, &mut monitor).unwrap();
        assert!(outcome.monitor.ticket.is_some());
        assert_eq!(monitor.latest_issued_seq(), 1);
    }

    #[test]
    fn test_entering_region_hides_alert() {
        let (mut tracker, mut monitor) = setup(RestingPolicy::Independent);

        // Establish a route far away, then go off-route
        let start = offset_m(&SCHOOL, -300.0, 0.0);
        let first = tracker.on_position_update(start, &mut monitor).unwrap();
        let ticket = first.monitor.ticket.unwrap();
        monitor.apply_route_result(ticket.seq, Ok(Route::new(vec![start])));
        let off = tracker.on_position_update(offset_m(&start, 0.0, 80.0), &mut monitor).unwrap();
        assert_eq!(alert_signals(&off.signals), vec![true]);

        // Arrive at the school: resting shows, alert hides
        let arrived = tracker.on_position_update(SCHOOL, &mut monitor).unwrap();
        assert_eq!(resting_signals(&arrived.signals), vec![true]);
        assert!(!alert_signals(&arrived.signals)[0]);
    }

    #[test]
    fn test_alert_follows_verdict() {
        let (mut tracker, mut monitor) = setup(RestingPolicy::Independent);
        let start = offset_m(&SCHOOL, -300.0, 0.0);

        let first = tracker.on_position_update(start, &mut monitor).unwrap();
        let ticket = first.monitor.ticket.unwrap();
        assert!(matches!(
            monitor.apply_route_result(ticket.seq, Ok(Route::new(vec![start]))),
            RouteUpdate::Applied { .. }
        ));

        let on = tracker.on_position_update(start, &mut monitor).unwrap();
        assert!(alert_signals(&on.signals).is_empty(), "alert already hidden");

        let off = tracker.on_position_update(offset_m(&start, 50.0, 0.0), &mut monitor).unwrap();
        assert_eq!(alert_signals(&off.signals), vec![true]);
        assert!(tracker.is_alert_visible());

        let further = offset_m(&start, 60.0, 0.0);
        let off_again = tracker.on_position_update(further, &mut monitor).unwrap();
        assert!(alert_signals(&off_again.signals).is_empty());
    }

    #[test]
    fn test_geofence_scenario() {
        let (mut tracker, mut monitor) = setup(RestingPolicy::Independent);

        // Entry event shows resting
        assert_eq!(
            tracker.on_region_entered("school"),
            vec![PresentationSignal::RestingVisible(true)]
        );

        // Position 5 m from the center is outside a zero threshold
        let outcome = tracker
            .on_position_update(offset_m(&SCHOOL, 5.0, 0.0), &mut monitor)
            .unwrap();
        assert_eq!(resting_signals(&outcome.signals), vec![false]);

        // Exit afterwards is a no-op
        assert!(tracker.on_region_exited("school").is_empty());
        assert!(!tracker.is_resting_visible());
    }

    #[test]
    fn test_independent_events_do_not_touch_inside_flag() {
        let (mut tracker, _) = setup(RestingPolicy::Independent);

        tracker.on_region_entered("school");
        assert!(tracker.is_resting_visible());
        assert!(!tracker.is_user_in_safe_region());
    }

    #[test]
    fn test_unified_events_write_inside_flag() {
        let (mut tracker, _) = setup(RestingPolicy::Unified);

        let entered = tracker.on_region_entered("school");
        assert_eq!(entered, vec![PresentationSignal::RestingVisible(true)]);
        assert!(tracker.is_user_in_safe_region());

        // Redundant entry is a no-op
        assert!(tracker.on_region_entered("school").is_empty());

        let exited = tracker.on_region_exited("school");
        assert_eq!(exited, vec![PresentationSignal::RestingVisible(false)]);
        assert!(!tracker.is_user_in_safe_region());
    }

    #[test]
    fn test_unknown_region_ignored() {
        let (mut tracker, _) = setup(RestingPolicy::Independent);

        assert!(tracker.on_region_entered("playground").is_empty());
        assert!(!tracker.is_resting_visible());
    }

    #[test]
    fn test_invalid_position_rejected() {
        let (mut tracker, mut monitor) = setup(RestingPolicy::Independent);

        let result = tracker.on_position_update(Coordinate::new(f64::INFINITY, 0.0), &mut monitor);
        assert!(matches!(result, Err(TrackingError::InvalidCoordinate { .. })));
        assert_eq!(monitor.latest_issued_seq(), 0);
    }
}
