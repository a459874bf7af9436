//! Scenario runner - drives a TrackingSession through simulated walks.

use crate::context::SimContext;
use crate::location::ScriptedLocationProvider;
use crate::presenter::RecordingPresenter;
use crate::routing::{straight_polyline, ManualRoutingClient, SimRoutingClient, SimRoutingConfig};
use crate::scenarios::ScenarioId;
use crate::walker::Walker;

use safewalk_core::geometry::offset_m;
use safewalk_core::{
    PresentationSignal, RouteUpdate, SessionStats, StalenessPolicy, TrackingConfig,
    TrackingError, TrackingSession,
};
use safewalk_env::{Coordinate, LocationEvent, Route, RoutingClient, SessionId, TrackingContext};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Position fixes fed to the session
    pub total_fixes: u64,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Session counters at the end of the run
    pub stats: SessionStats,

    /// What the presenter saw
    pub metrics: ScenarioMetrics,
}

/// Presentation metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    pub alerts_raised: usize,
    pub resting_shown: usize,
    pub route_redraws: usize,
}

/// Reasons a scenario could not run at all.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("session rejected: {0}")]
    Session(#[from] TrackingError),
}

type SimSession<R> = TrackingSession<SimContext, R, RecordingPresenter>;

/// Assertions collected over one run.
#[derive(Default)]
struct Checks {
    failures: Vec<String>,
}

impl Checks {
    fn require(&mut self, condition: bool, message: impl FnOnce() -> String) {
        if !condition {
            self.failures.push(message());
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.failures.push(message.into());
    }
}

/// Everything a scenario leaves behind for the result.
struct Run {
    context: Arc<SimContext>,
    presenter: Arc<RecordingPresenter>,
    stats: SessionStats,
    fixes: u64,
    checks: Checks,
}

/// Runs tracking scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Tracking configuration handed to every session
    config: TrackingConfig,

    /// Where every walk starts
    home: Coordinate,

    /// Virtual time between fixes
    fix_interval: Duration,

    /// GPS noise standard deviation in meters
    gps_noise_m: f64,

    /// Radius the simulated OS uses for geofence events
    geofence_radius_m: f64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: TrackingConfig::default(),
            home: Coordinate::new(52.3850, 13.1150),
            fix_interval: Duration::from_secs(1),
            gps_noise_m: 2.0,
            geofence_radius_m: 50.0,
        }
    }

    /// Sets the tracking configuration.
    pub fn with_config(mut self, config: TrackingConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the GPS noise.
    pub fn with_noise(mut self, std_dev_m: f64) -> Self {
        self.gps_noise_m = std_dev_m;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => return self.aborted(scenario, ScenarioError::Runtime(e).to_string()),
        };

        let run = runtime.block_on(async {
            match scenario {
                ScenarioId::SchoolRun => self.run_school_run().await,
                ScenarioId::Detour => self.run_detour().await,
                ScenarioId::SchoolArrival => self.run_school_arrival().await,
                ScenarioId::RoutingOutage => self.run_routing_outage().await,
                ScenarioId::StaleRoute => self.run_stale_route().await,
                ScenarioId::SlowRouting => self.run_slow_routing().await,
            }
        });

        match run {
            Ok(run) => self.finish(scenario, run),
            Err(e) => self.aborted(scenario, e.to_string()),
        }
    }

    /// SW-001: SchoolRun - noisy walk along the route.
    ///
    /// **Assertion**: fewer than 5% off-route verdicts, school region
    /// entered and left.
    async fn run_school_run(&self) -> Result<Run, ScenarioError> {
        info!("SW-001: SchoolRun - walk to destination");

        let walker = self.walker().then_to(self.config.destination);
        let mut run = self.walk(walker, self.sim_routing(SimRoutingConfig::default())).await?;

        let verdicts = run.stats.on_route_verdicts + run.stats.off_route_verdicts;
        let off_ratio = run.stats.off_route_verdicts as f64 / verdicts.max(1) as f64;
        run.checks.require(verdicts > 0, || "no verdicts issued".to_string());
        run.checks.require(off_ratio < 0.05, || {
            format!("off-route ratio {:.1}% exceeds 5%", off_ratio * 100.0)
        });
        run.checks.require(run.stats.region_events >= 2, || {
            format!("expected school entry and exit, saw {} region events", run.stats.region_events)
        });
        run.checks.require(!run.presenter.alert_visible(), || {
            "alert still showing at destination".to_string()
        });

        info!(
            "✓ SchoolRun complete: {} fixes, {} off-route ({:.1}%)",
            run.fixes,
            run.stats.off_route_verdicts,
            off_ratio * 100.0
        );
        Ok(run)
    }

    /// SW-002: Detour - the child leaves the route for a side street.
    ///
    /// **Assertion**: alert raised, re-route applied, predefined route kept,
    /// alert withdrawn by the destination.
    async fn run_detour(&self) -> Result<Run, ScenarioError> {
        info!("SW-002: Detour - leave and rejoin the route");

        let (start, destination) = (self.home, self.config.destination);
        let along = |t: f64| {
            Coordinate::new(
                start.latitude + (destination.latitude - start.latitude) * t,
                start.longitude + (destination.longitude - start.longitude) * t,
            )
        };

        // Roughly perpendicular to the north-east heading, 60m out
        let leave = along(0.4);
        let side_street = offset_m(&leave, -34.0, 49.0);
        let rejoin = along(0.6);

        let walker = self
            .walker()
            .then_to(leave)
            .then_to(side_street)
            .then_to(rejoin)
            .then_to(destination);

        let context = SimContext::shared(self.seed);
        let routing = Arc::new(SimRoutingClient::new(context.clone(), SimRoutingConfig::default()));
        let (mut session, presenter) = self.session(context.clone(), routing)?;

        let mut checks = Checks::default();
        let mut fixes = 0;
        let mut first_route: Option<Route> = None;

        for events in walker {
            fixes += self.step(&context, &mut session, events).await;
            if first_route.is_none() {
                first_route = session.state().predefined_route;
            }
        }

        let state = session.state();
        checks.require(first_route.is_some(), || "no route ever applied".to_string());
        checks.require(state.predefined_route == first_route, || {
            "predefined route changed after re-routing".to_string()
        });
        checks.require(state.current_route != state.predefined_route, || {
            "current route never replaced".to_string()
        });

        let stats = session.stop();
        checks.require(stats.off_route_verdicts > 0, || "detour never detected".to_string());
        checks.require(stats.routes_applied >= 2, || {
            format!("expected a re-route, {} routes applied", stats.routes_applied)
        });
        checks.require(presenter.alerts_raised() > 0, || "alert never shown".to_string());
        checks.require(!presenter.alert_visible(), || {
            "alert still showing after rejoining the route".to_string()
        });

        info!(
            "✓ Detour complete: {} off-route verdicts, {} routes applied",
            stats.off_route_verdicts, stats.routes_applied
        );
        Ok(Run {
            context,
            presenter,
            stats,
            fixes,
            checks,
        })
    }

    /// SW-003: SchoolArrival - stop at the school, then walk on.
    ///
    /// **Assertion**: resting indicator shown while at school and withdrawn
    /// after leaving.
    async fn run_school_arrival(&self) -> Result<Run, ScenarioError> {
        info!("SW-003: SchoolArrival - resting indicator");

        let walker = self
            .walker()
            .with_noise(0.0)
            .then_to(self.config.safe_region_center)
            .dwell(10)
            .then_to(self.config.destination);
        let mut run = self.walk(walker, self.sim_routing(SimRoutingConfig::default())).await?;

        let resting: Vec<bool> = run
            .presenter
            .signals()
            .into_iter()
            .filter_map(|s| match s {
                PresentationSignal::RestingVisible(v) => Some(v),
                _ => None,
            })
            .collect();

        let shown = resting.iter().position(|v| *v);
        let withdrawn = resting.iter().rposition(|v| !*v);
        run.checks.require(shown.is_some(), || "resting indicator never shown".to_string());
        run.checks.require(
            matches!((shown, withdrawn), (Some(s), Some(w)) if w > s),
            || "resting indicator never withdrawn".to_string(),
        );
        run.checks.require(!run.presenter.resting_visible(), || {
            "resting indicator still showing at destination".to_string()
        });

        info!(
            "✓ SchoolArrival complete: resting shown {} time(s)",
            run.presenter.resting_shown()
        );
        Ok(run)
    }

    /// SW-004: RoutingOutage - directions fail, then return an empty route.
    ///
    /// **Assertion**: no verdict before a route exists, the empty route
    /// reads as off-route, tracking recovers once real routes arrive.
    async fn run_routing_outage(&self) -> Result<Run, ScenarioError> {
        info!("SW-004: RoutingOutage - failed and empty calculations");

        let context = SimContext::shared(self.seed);
        let routing = Arc::new(SimRoutingClient::new(
            context.clone(),
            SimRoutingConfig {
                failures: 3,
                empty_routes: 1,
                ..Default::default()
            },
        ));
        let (mut session, presenter) = self.session(context.clone(), routing)?;

        let mut checks = Checks::default();
        let mut fixes = 0;
        let walker = self.walker().then_to(self.config.destination);

        for events in walker {
            let had_route = session.state().current_route.is_some();
            let before = session.stats().clone();
            fixes += self.step(&context, &mut session, events).await;

            let after = session.stats();
            let verdicts = (after.on_route_verdicts + after.off_route_verdicts)
                - (before.on_route_verdicts + before.off_route_verdicts);
            if !had_route && verdicts > 0 {
                checks.fail(format!("verdict issued without a route at fix {}", fixes));
            }
        }

        let state = session.state();
        checks.require(
            state.current_route.as_ref().is_some_and(|r| !r.is_empty()),
            || "never recovered a usable route".to_string(),
        );

        let stats = session.stop();
        checks.require(stats.failed_calculations == 3, || {
            format!("expected 3 failed calculations, saw {}", stats.failed_calculations)
        });
        checks.require(stats.off_route_verdicts > 0, || {
            "empty route did not read as off-route".to_string()
        });
        checks.require(!presenter.alert_visible(), || {
            "alert still showing after recovery".to_string()
        });

        info!(
            "✓ RoutingOutage complete: {} failed, {} applied",
            stats.failed_calculations, stats.routes_applied
        );
        Ok(Run {
            context,
            presenter,
            stats,
            fixes,
            checks,
        })
    }

    /// SW-005: StaleRoute - two calculations in flight, newer finishes first.
    ///
    /// Runs with `StalenessPolicy::NewerThanApplied` so both calculations
    /// stay alive.
    ///
    /// **Assertion**: the older result is discarded and never drawn.
    async fn run_stale_route(&self) -> Result<Run, ScenarioError> {
        info!("SW-005: StaleRoute - out-of-order completions");

        let context = SimContext::shared(self.seed);
        let routing = Arc::new(ManualRoutingClient::new());
        let config = TrackingConfig {
            staleness: StalenessPolicy::NewerThanApplied,
            ..self.config.clone()
        };
        let presenter = Arc::new(RecordingPresenter::new());
        let mut session =
            TrackingSession::new(context.clone(), routing.clone(), presenter.clone(), config)?
                .with_id(SessionId::from_seed(self.seed));

        let mut checks = Checks::default();
        let destination = self.config.destination;
        let first = self.home;
        let second = offset_m(&self.home, 30.0, 0.0);

        // No route yet: both fixes issue a request
        for (i, position) in [first, second].into_iter().enumerate() {
            context.advance_time(self.fix_interval);
            session.handle_location_event(LocationEvent::Position(position));
            routing.wait_for_pending(i + 1).await;
        }

        let newer = Route::new(straight_polyline(second, destination, 5.0));
        let older = Route::new(straight_polyline(first, destination, 5.0));

        checks.require(routing.resolve(1, Ok(newer.clone())), || "newer request lost".to_string());
        let applied = session.next_completion().await;
        checks.require(routing.resolve(0, Ok(older)), || "older request lost".to_string());
        let stale = session.next_completion().await;

        debug!(
            "Completions: {:?} then {:?}",
            applied.as_ref().map(RouteUpdate::seq),
            stale.as_ref().map(RouteUpdate::seq)
        );

        checks.require(matches!(applied, Some(RouteUpdate::Applied { seq: 2, .. })), || {
            "newer calculation was not applied".to_string()
        });
        checks.require(matches!(stale, Some(RouteUpdate::Stale { seq: 1, .. })), || {
            "older calculation was not discarded".to_string()
        });
        checks.require(session.state().current_route.as_ref() == Some(&newer), || {
            "older route overwrote the newer one".to_string()
        });
        checks.require(presenter.redraws() == 1, || {
            format!("expected one redraw, saw {}", presenter.redraws())
        });

        let stats = session.stop();
        info!("✓ StaleRoute complete: {} stale completion(s) discarded", stats.stale_completions);
        Ok(Run {
            context,
            presenter,
            stats,
            fixes: 2,
            checks,
        })
    }

    /// SW-006: SlowRouting - fixes outpace the directions service.
    ///
    /// Events go through `TrackingSession::run` on a driven clock, so each
    /// calculation is still pending when the next fixes arrive.
    ///
    /// **Assertion**: a route lands within the first few fixes, later fixes
    /// are judged against it, and pending calculations are not re-requested.
    async fn run_slow_routing(&self) -> Result<Run, ScenarioError> {
        info!("SW-006: SlowRouting - fixes outpace routing");

        let latency = self.fix_interval * 5 / 2;
        let context = SimContext::driven(self.seed);
        let routing = Arc::new(SimRoutingClient::new(
            context.clone(),
            SimRoutingConfig {
                latency,
                ..Default::default()
            },
        ));
        let (session, presenter) = self.session(context.clone(), routing)?;
        let (feed, provider) = ScriptedLocationProvider::new();
        let provider = Arc::new(provider);

        let walker = self.walker().then_to(self.config.destination);
        let feeding = {
            let context = context.clone();
            let presenter = presenter.clone();
            let interval = self.fix_interval;
            async move {
                let mut fixes = 0u64;
                for events in walker {
                    context.advance_time(interval);
                    for event in events {
                        if matches!(event, LocationEvent::Position(_)) {
                            fixes += 1;
                        }
                        if !feed.push(event) {
                            return fixes;
                        }
                    }
                    // Wait until the session took every position (one recenter
                    // each), then let what it spawned start before time moves
                    while (presenter.recenters() as u64) < fixes {
                        tokio::task::yield_now().await;
                    }
                    tokio::task::yield_now().await;
                }
                // Closing the feed ends the session loop
                drop(feed);
                fixes
            }
        };

        let (stats, fixes) = tokio::join!(session.run(provider.clone()), feeding);

        let mut checks = Checks::default();
        let verdicts = stats.on_route_verdicts + stats.off_route_verdicts;
        let unjudged = stats.updates_processed.saturating_sub(verdicts);
        let warmup = (latency.as_secs_f64() / self.fix_interval.as_secs_f64()).ceil() as u64 + 1;
        let first_requests = match self.config.staleness {
            StalenessPolicy::LatestIssued => 1,
            StalenessPolicy::NewerThanApplied => unjudged,
        };

        checks.require(provider.regions().len() == 1, || {
            format!("safe region registered {} times", provider.regions().len())
        });
        checks.require(stats.routes_applied > 0, || {
            "no route applied while fixes outpaced routing".to_string()
        });
        checks.require(unjudged <= warmup, || {
            format!("{} fixes without a verdict, expected at most {}", unjudged, warmup)
        });
        let request_limit = first_requests + stats.off_route_verdicts;
        checks.require(stats.recalculations_requested <= request_limit, || {
            format!(
                "{} requests for {} off-route verdicts",
                stats.recalculations_requested, stats.off_route_verdicts
            )
        });
        checks.require(!presenter.alert_visible(), || {
            "alert still showing at destination".to_string()
        });

        info!(
            "✓ SlowRouting complete: {} fixes, {} requests, {} routes applied",
            fixes, stats.recalculations_requested, stats.routes_applied
        );
        Ok(Run {
            context,
            presenter,
            stats,
            fixes,
            checks,
        })
    }

    fn walker(&self) -> Walker {
        // Walker noise is seeded apart from the context
        Walker::new(self.seed.wrapping_mul(0x9e3779b97f4a7c15), self.home)
            .with_noise(self.gps_noise_m)
            .with_geofence(
                self.config.safe_region_id.clone(),
                self.config.safe_region_center,
                self.geofence_radius_m,
            )
    }

    fn sim_routing(&self, config: SimRoutingConfig) -> (Arc<SimContext>, Arc<SimRoutingClient>) {
        let context = SimContext::shared(self.seed);
        let routing = Arc::new(SimRoutingClient::new(context.clone(), config));
        (context, routing)
    }

    fn session<R: RoutingClient>(
        &self,
        context: Arc<SimContext>,
        routing: Arc<R>,
    ) -> Result<(SimSession<R>, Arc<RecordingPresenter>), ScenarioError> {
        let presenter = Arc::new(RecordingPresenter::new());
        let config = self.config.clone();
        let session = TrackingSession::new(context, routing, presenter.clone(), config)?
            .with_id(SessionId::from_seed(self.seed));
        Ok((session, presenter))
    }

    /// Feeds one fix worth of events and lets outstanding routes land.
    /// Returns the number of positions fed.
    async fn step<R: RoutingClient>(
        &self,
        context: &SimContext,
        session: &mut SimSession<R>,
        events: Vec<LocationEvent>,
    ) -> u64 {
        context.advance_time(self.fix_interval);
        let mut positions = 0;
        for event in events {
            if matches!(event, LocationEvent::Position(_)) {
                positions += 1;
            }
            session.handle_location_event(event);
        }
        session.settle().await;
        positions
    }

    /// Walks `walker` through a fresh session with region registration.
    async fn walk(
        &self,
        walker: Walker,
        (context, routing): (Arc<SimContext>, Arc<SimRoutingClient>),
    ) -> Result<Run, ScenarioError> {
        let (mut session, presenter) = self.session(context.clone(), routing)?;
        let mut checks = Checks::default();

        let (_feed, provider) = ScriptedLocationProvider::new();
        if let Err(e) = session.start(&provider).await {
            warn!("Region registration failed: {}", e);
            checks.fail(format!("region registration failed: {}", e));
        }
        checks.require(provider.regions().len() == 1, || "safe region not registered".to_string());

        let mut fixes = 0;
        for events in walker {
            fixes += self.step(&context, &mut session, events).await;
        }

        let stats = session.stop();
        Ok(Run {
            context,
            presenter,
            stats,
            fixes,
            checks,
        })
    }

    fn finish(&self, scenario: ScenarioId, run: Run) -> ScenarioResult {
        let passed = run.checks.failures.is_empty();
        if !passed {
            warn!("{} failed: {}", scenario.name(), run.checks.failures.join("; "));
        }

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_fixes: run.fixes,
            final_time_secs: run.context.now().as_secs_f64(),
            failure_reason: if passed {
                None
            } else {
                Some(run.checks.failures.join("; "))
            },
            metrics: ScenarioMetrics {
                alerts_raised: run.presenter.alerts_raised(),
                resting_shown: run.presenter.resting_shown(),
                route_redraws: run.presenter.redraws(),
            },
            stats: run.stats,
        }
    }

    fn aborted(&self, scenario: ScenarioId, reason: String) -> ScenarioResult {
        warn!("{} aborted: {}", scenario.name(), reason);
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            total_fixes: 0,
            final_time_secs: 0.0,
            failure_reason: Some(reason),
            stats: SessionStats::default(),
            metrics: ScenarioMetrics::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safewalk_core::AdherenceMode;

    #[test]
    fn test_all_scenarios_pass_default_seed() {
        let runner = ScenarioRunner::new(42);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario,
                result.failure_reason
            );
        }
    }

    #[test]
    fn test_runs_are_deterministic() {
        let a = ScenarioRunner::new(7).run(ScenarioId::Detour);
        let b = ScenarioRunner::new(7).run(ScenarioId::Detour);

        assert_eq!(a.stats, b.stats);
        assert_eq!(a.total_fixes, b.total_fixes);
        assert_eq!(a.final_time_secs, b.final_time_secs);
    }

    #[test]
    fn test_detour_passes_with_segment_adherence() {
        let config = TrackingConfig {
            adherence: AdherenceMode::Segment,
            ..Default::default()
        };
        let result = ScenarioRunner::new(3).with_config(config).run(ScenarioId::Detour);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_outage_counts_failures() {
        let result = ScenarioRunner::new(1).run(ScenarioId::RoutingOutage);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.stats.failed_calculations, 3);
        assert!(result.stats.routes_applied >= 2);
    }

    #[test]
    fn test_stale_route_discards_older_result() {
        let result = ScenarioRunner::new(9).run(ScenarioId::StaleRoute);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.stats.stale_completions, 1);
        assert_eq!(result.stats.routes_applied, 1);
        assert_eq!(result.metrics.route_redraws, 1);
    }

    #[test]
    fn test_slow_routing_still_gets_a_route() {
        let result = ScenarioRunner::new(11).run(ScenarioId::SlowRouting);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.stats.routes_applied >= 1);
        assert!(result.stats.on_route_verdicts > 0);
        assert!(result.stats.recalculations_requested < result.total_fixes);
    }

    #[test]
    fn test_slow_routing_under_newer_than_applied() {
        let config = TrackingConfig {
            staleness: StalenessPolicy::NewerThanApplied,
            ..Default::default()
        };
        let result = ScenarioRunner::new(11).with_config(config).run(ScenarioId::SlowRouting);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_result_serializes() {
        let result = ScenarioRunner::new(5).run(ScenarioId::SchoolArrival);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["scenario"], "school_arrival");
        assert_eq!(json["seed"], 5);
        assert!(json["stats"]["updates_processed"].as_u64().unwrap() > 0);
    }
}
