//! Route deviation detection.
//!
//! The monitor owns the reference route and decides, per position, whether
//! the child is still close enough to it. It never performs I/O: route
//! calculations leave as `RouteTicket`s and come back through
//! `apply_route_result`, tagged with the sequence number they were issued
//! under.
//!
//! ```text
//!   position ──► no route? ──yes──► ticket(seq+1)        (no verdict)
//!                   │                (none while the latest is pending,
//!                   │                 under LatestIssued)
//!                   no
//!                   ▼
//!          min distance to route ≤ tolerance ?
//!             │ yes                 │ no
//!             ▼                     ▼
//!          OnRoute          OffRoute + ticket(seq+1)
//! ```

use crate::config::{AdherenceMode, StalenessPolicy, TrackingConfig};
use crate::error::{Result, TrackingError};
use crate::geometry::{nearest_segment_distance, nearest_waypoint_distance};
use safewalk_env::{Coordinate, EnvError, Route, RouteRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Verdict for a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviationResult {
    OnRoute,
    OffRoute,
}

/// A route calculation the caller must perform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteTicket {
    /// Sequence number to hand back with the result
    pub seq: u64,

    /// What to ask the routing provider for
    pub request: RouteRequest,
}

/// Result of feeding one position to the monitor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitorOutcome {
    /// `None` while no route is stored
    pub verdict: Option<DeviationResult>,

    /// Distance to the route, if one was measured
    pub distance_m: Option<f64>,

    /// Calculation to start, if any
    pub ticket: Option<RouteTicket>,
}

/// What happened to a completed route calculation.
#[derive(Debug)]
pub enum RouteUpdate {
    /// The route replaced the current one
    Applied {
        seq: u64,
        route: Route,
        /// Also stored as the predefined route
        first: bool,
    },

    /// A newer request superseded this one; nothing changed
    Stale { seq: u64, latest: u64 },

    /// The calculation failed; nothing changed
    Failed { seq: u64, error: TrackingError },
}

impl RouteUpdate {
    pub fn seq(&self) -> u64 {
        match self {
            RouteUpdate::Applied { seq, .. }
            | RouteUpdate::Stale { seq, .. }
            | RouteUpdate::Failed { seq, .. } => *seq,
        }
    }
}

/// Classifies `position` against `route`.
///
/// An empty route is always off-route: nothing is close to nothing.
pub fn evaluate_route(
    position: &Coordinate,
    route: &Route,
    allowed_distance_m: f64,
    adherence: AdherenceMode,
) -> (DeviationResult, Option<f64>) {
    let distance = match adherence {
        AdherenceMode::Waypoint => nearest_waypoint_distance(position, route.waypoints()),
        AdherenceMode::Segment => nearest_segment_distance(position, route.waypoints()),
    };

    match distance {
        Some(d) if d <= allowed_distance_m => (DeviationResult::OnRoute, Some(d)),
        other => (DeviationResult::OffRoute, other),
    }
}

/// Owns the reference route and the deviation verdict.
#[derive(Debug, Clone)]
pub struct RouteMonitor {
    destination: Coordinate,
    allowed_distance_m: f64,
    adherence: AdherenceMode,
    staleness: StalenessPolicy,

    /// Live route, replaced on every applied calculation
    current_route: Option<Route>,

    /// First route ever applied; never replaced
    predefined_route: Option<Route>,

    is_off_route: bool,

    /// Last sequence number handed out (0 = none yet)
    latest_issued: u64,

    /// Sequence number of the route currently stored (0 = none)
    last_applied: u64,

    /// Highest sequence number whose completion was accepted, applied or failed
    last_resolved: u64,
}

impl RouteMonitor {
    /// Creates a monitor with waypoint adherence and latest-issued staleness.
    pub fn new(destination: Coordinate, allowed_distance_m: f64) -> Self {
        Self {
            destination,
            allowed_distance_m,
            adherence: AdherenceMode::default(),
            staleness: StalenessPolicy::default(),
            current_route: None,
            predefined_route: None,
            is_off_route: false,
            latest_issued: 0,
            last_applied: 0,
            last_resolved: 0,
        }
    }

    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(config.destination, config.allowed_distance_m)
            .with_adherence(config.adherence)
            .with_staleness(config.staleness)
    }

    /// Sets the adherence measure.
    pub fn with_adherence(mut self, adherence: AdherenceMode) -> Self {
        self.adherence = adherence;
        self
    }

    /// Sets the stale completion policy.
    pub fn with_staleness(mut self, staleness: StalenessPolicy) -> Self {
        self.staleness = staleness;
        self
    }

    /// Handles a position update.
    ///
    /// Without a stored route this only asks for one. Under
    /// `StalenessPolicy::LatestIssued` it asks at most once per pending
    /// request, so the first calculation is never superseded. With a route
    /// it classifies the position and asks for a recalculation from here
    /// when the child is off-route.
    pub fn on_position_update(&mut self, position: Coordinate) -> Result<MonitorOutcome> {
        if !position.is_valid() {
            return Err(TrackingError::InvalidCoordinate {
                latitude: position.latitude,
                longitude: position.longitude,
            });
        }

        let Some(route) = &self.current_route else {
            if self.staleness == StalenessPolicy::LatestIssued && self.awaiting_route() {
                debug!("No route yet, still waiting for seq={}", self.latest_issued);
                return Ok(MonitorOutcome::default());
            }
            debug!("No route yet, requesting one from {}", position);
            let ticket = self.issue(position);
            return Ok(MonitorOutcome {
                ticket: Some(ticket),
                ..Default::default()
            });
        };

        let (verdict, distance_m) =
            evaluate_route(&position, route, self.allowed_distance_m, self.adherence);
        self.is_off_route = verdict == DeviationResult::OffRoute;

        match verdict {
            DeviationResult::OnRoute => {
                debug!(
                    "On route at {} ({:.1}m from route)",
                    position,
                    distance_m.unwrap_or(0.0)
                );
                Ok(MonitorOutcome {
                    verdict: Some(verdict),
                    distance_m,
                    ticket: None,
                })
            }
            DeviationResult::OffRoute => {
                info!(
                    "Off route at {} (nearest {}), recalculating",
                    position,
                    distance_m.map_or("n/a".to_string(), |d| format!("{:.1}m", d))
                );
                let ticket = self.issue(position);
                Ok(MonitorOutcome {
                    verdict: Some(verdict),
                    distance_m,
                    ticket: Some(ticket),
                })
            }
        }
    }

    /// Hands out the next sequence number for a request from `source`.
    fn issue(&mut self, source: Coordinate) -> RouteTicket {
        self.latest_issued += 1;
        RouteTicket {
            seq: self.latest_issued,
            request: RouteRequest::walking(source, self.destination),
        }
    }

    /// True while the latest issued request has not come back.
    pub fn awaiting_route(&self) -> bool {
        self.latest_issued > self.last_resolved
    }

    /// Returns true if a completion with this sequence number may still
    /// replace the current route.
    pub fn accepts(&self, seq: u64) -> bool {
        if seq == 0 || seq > self.latest_issued {
            return false;
        }
        match self.staleness {
            StalenessPolicy::LatestIssued => seq == self.latest_issued,
            StalenessPolicy::NewerThanApplied => seq > self.last_applied,
        }
    }

    /// Applies a completed calculation.
    ///
    /// Stale completions and failures leave the state untouched. An empty
    /// route is stored (it is a successful answer) and classifies every
    /// later position as off-route.
    pub fn apply_route_result(
        &mut self,
        seq: u64,
        result: std::result::Result<Route, EnvError>,
    ) -> RouteUpdate {
        if !self.accepts(seq) {
            warn!(
                "Discarding stale route result seq={} (latest issued {}, applied {})",
                seq, self.latest_issued, self.last_applied
            );
            return RouteUpdate::Stale {
                seq,
                latest: self.latest_issued,
            };
        }

        self.last_resolved = self.last_resolved.max(seq);

        let route = match result {
            Ok(route) => route,
            Err(e) => {
                let error = TrackingError::RouteCalculationFailed(e);
                warn!("Route seq={} not applied: {}", seq, error);
                return RouteUpdate::Failed { seq, error };
            }
        };

        if route.is_empty() {
            warn!("Route seq={}: {}", seq, TrackingError::EmptyRoute);
        }

        let first = self.predefined_route.is_none();
        if first {
            self.predefined_route = Some(route.clone());
        }
        self.current_route = Some(route.clone());
        self.last_applied = seq;

        info!(
            "Applied route seq={} with {} waypoints{}",
            seq,
            route.len(),
            if first { " (predefined)" } else { "" }
        );

        RouteUpdate::Applied { seq, route, first }
    }

    pub fn current_route(&self) -> Option<&Route> {
        self.current_route.as_ref()
    }

    pub fn predefined_route(&self) -> Option<&Route> {
        self.predefined_route.as_ref()
    }

    /// Verdict of the last classified position.
    pub fn is_off_route(&self) -> bool {
        self.is_off_route
    }

    pub fn destination(&self) -> Coordinate {
        self.destination
    }

    pub fn allowed_distance_m(&self) -> f64 {
        self.allowed_distance_m
    }

    pub fn latest_issued_seq(&self) -> u64 {
        self.latest_issued
    }

    pub fn last_applied_seq(&self) -> u64 {
        self.last_applied
    }
}
