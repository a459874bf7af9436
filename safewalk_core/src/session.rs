//! Tracking Session - the serialized owner of all tracking state.
//!
//! Location events and route completions funnel through one task, one at
//! a time, so the route, region flags and signal latches need no locking.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TrackingSession                         │
//! │                                                             │
//! │  LocationProvider ──► LocationTracker ──► RouteMonitor      │
//! │                            │                  │  ticket     │
//! │                            ▼                  ▼             │
//! │                       Presenter       ctx.spawn(routing)    │
//! │                            ▲                  │             │
//! │                            └── completions ◄──┘             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use safewalk_core::{TrackingConfig, TrackingSession};
//! use safewalk_env::TokioContext;
//!
//! let config = TrackingConfig::default();
//! let session = TrackingSession::new(TokioContext::shared(), routing, presenter, config)?;
//! let stats = session.run(provider).await;
//! ```

use crate::config::{StalenessPolicy, TrackingConfig};
use crate::error::{Result, TrackingError};
use crate::region::SafeRegion;
use crate::route_monitor::{DeviationResult, RouteMonitor, RouteTicket, RouteUpdate};
use crate::signals::PresentationSignal;
use crate::tracker::LocationTracker;

use safewalk_env::{
    EnvError, LocationEvent, LocationProvider, Presenter, Route, RoutingClient, SessionId,
    TrackingContext,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Snapshot of the tracking state.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingState {
    /// Live route; `None` only before the first successful calculation
    pub current_route: Option<Route>,

    /// First route ever calculated
    pub predefined_route: Option<Route>,

    pub is_user_in_safe_region: bool,

    pub is_off_route: bool,
}

/// Counters collected over a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub updates_processed: u64,
    pub invalid_updates: u64,
    pub region_events: u64,
    pub on_route_verdicts: u64,
    pub off_route_verdicts: u64,
    pub recalculations_requested: u64,
    pub routes_applied: u64,
    pub stale_completions: u64,
    pub failed_calculations: u64,

    /// Context time of the last accepted position
    pub last_update_at: Option<Duration>,
}

/// A finished route calculation on its way back into the session.
#[derive(Debug)]
pub struct RouteCompletion {
    pub seq: u64,
    pub result: std::result::Result<Route, EnvError>,
}

enum Step {
    Completion(RouteCompletion),
    Location(Option<LocationEvent>),
}

/// A tracking session generic over its environment.
///
/// The same session code runs against `TokioContext` in production and
/// against the simulation context in the harness.
pub struct TrackingSession<Ctx, R, P>
where
    Ctx: TrackingContext,
    R: RoutingClient,
    P: Presenter,
{
    /// Session identifier (for logging)
    pub id: SessionId,

    context: Arc<Ctx>,
    routing: Arc<R>,
    presenter: Arc<P>,
    config: TrackingConfig,

    monitor: RouteMonitor,
    tracker: LocationTracker,

    completions_tx: mpsc::UnboundedSender<RouteCompletion>,
    completions_rx: mpsc::UnboundedReceiver<RouteCompletion>,

    /// Calculations spawned but not yet processed, by sequence number
    in_flight: BTreeMap<u64, JoinHandle<()>>,

    /// Set once the provider accepted the safe region
    region_registered: bool,

    stats: SessionStats,
}

impl<Ctx, R, P> TrackingSession<Ctx, R, P>
where
    Ctx: TrackingContext,
    R: RoutingClient,
    P: Presenter,
{
    /// Creates a session after validating `config`.
    pub fn new(
        context: Arc<Ctx>,
        routing: Arc<R>,
        presenter: Arc<P>,
        config: TrackingConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Ok(Self {
            id: SessionId::new(),
            context,
            routing,
            presenter,
            monitor: RouteMonitor::from_config(&config),
            tracker: LocationTracker::from_config(&config),
            config,
            completions_tx,
            completions_rx,
            in_flight: BTreeMap::new(),
            region_registered: false,
            stats: SessionStats::default(),
        })
    }

    /// Overrides the session identifier.
    pub fn with_id(mut self, id: SessionId) -> Self {
        self.id = id;
        self
    }

    /// Registers the safe region for entry/exit events.
    ///
    /// `run` registers on its own; call this first only to see the error.
    pub async fn start<L: LocationProvider>(&mut self, provider: &L) -> Result<()> {
        register_region(self.id, self.tracker.region().clone(), provider).await?;
        self.region_registered = true;
        Ok(())
    }

    /// Runs the session until the provider stops delivering events.
    ///
    /// Completions are preferred over new location events so a resolved
    /// route is in place before the next position is judged.
    pub async fn run<L: LocationProvider>(mut self, provider: Arc<L>) -> SessionStats {
        if !self.region_registered {
            // Position tracking still works without geofence events
            if let Err(e) = self.start(provider.as_ref()).await {
                warn!("Session {}: {}", self.id, e);
            }
        }

        loop {
            let step = tokio::select! {
                biased;
                Some(completion) = self.completions_rx.recv() => Step::Completion(completion),
                event = provider.next_event() => Step::Location(event),
            };

            match step {
                Step::Completion(completion) => {
                    self.handle_route_completion(completion);
                }
                Step::Location(Some(event)) => self.handle_location_event(event),
                Step::Location(None) => break,
            }
        }

        self.stop()
    }

    /// Stops tracking: aborts outstanding calculations and returns the
    /// final statistics.
    pub fn stop(mut self) -> SessionStats {
        for (_, handle) in std::mem::take(&mut self.in_flight) {
            handle.abort();
        }
        info!(
            "Session {} stopped after {} updates ({} off-route, {} routes applied)",
            self.id,
            self.stats.updates_processed,
            self.stats.off_route_verdicts,
            self.stats.routes_applied
        );
        self.stats
    }

    /// Processes one location event.
    pub fn handle_location_event(&mut self, event: LocationEvent) {
        match event {
            LocationEvent::Position(position) => self.handle_position(position),
            LocationEvent::RegionEntered(id) => {
                self.stats.region_events += 1;
                let signals = self.tracker.on_region_entered(&id);
                self.deliver(&signals);
            }
            LocationEvent::RegionExited(id) => {
                self.stats.region_events += 1;
                let signals = self.tracker.on_region_exited(&id);
                self.deliver(&signals);
            }
        }
    }

    fn handle_position(&mut self, position: safewalk_env::Coordinate) {
        let outcome = match self.tracker.on_position_update(position, &mut self.monitor) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.stats.invalid_updates += 1;
                warn!("Session {}: ignoring position: {}", self.id, e);
                return;
            }
        };

        self.stats.updates_processed += 1;
        self.stats.last_update_at = Some(self.context.now());

        match outcome.monitor.verdict {
            Some(DeviationResult::OnRoute) => self.stats.on_route_verdicts += 1,
            Some(DeviationResult::OffRoute) => self.stats.off_route_verdicts += 1,
            None => {}
        }

        self.deliver(&outcome.signals);

        if let Some(ticket) = outcome.monitor.ticket {
            self.dispatch(ticket);
        }
    }

    /// Spawns the routing call for `ticket`. The result comes back through
    /// the completion channel.
    fn dispatch(&mut self, ticket: RouteTicket) {
        if self.config.staleness == StalenessPolicy::LatestIssued {
            for (seq, handle) in std::mem::take(&mut self.in_flight) {
                debug!("Aborting superseded route calculation seq={}", seq);
                handle.abort();
            }
        }

        let RouteTicket { seq, request } = ticket;
        let routing = Arc::clone(&self.routing);
        let tx = self.completions_tx.clone();

        let handle = self.context.spawn("route-calculation", async move {
            let result = routing.calculate(request).await;
            // Receiver is gone only once the session stopped
            let _ = tx.send(RouteCompletion { seq, result });
        });

        self.in_flight.insert(seq, handle);
        self.stats.recalculations_requested += 1;
        debug!(
            "Requested route seq={} from {} to {}",
            seq, request.source, request.destination
        );
    }

    /// Applies one finished calculation.
    pub fn handle_route_completion(&mut self, completion: RouteCompletion) -> RouteUpdate {
        self.in_flight.remove(&completion.seq);

        let update = self.monitor.apply_route_result(completion.seq, completion.result);
        match &update {
            RouteUpdate::Applied { route, .. } => {
                self.stats.routes_applied += 1;
                PresentationSignal::RedrawRoute(route.clone()).deliver(self.presenter.as_ref());
            }
            RouteUpdate::Stale { .. } => self.stats.stale_completions += 1,
            RouteUpdate::Failed { .. } => self.stats.failed_calculations += 1,
        }
        update
    }

    /// Waits for the next completion and applies it.
    ///
    /// Returns `None` when nothing is outstanding.
    pub async fn next_completion(&mut self) -> Option<RouteUpdate> {
        let completion = match self.completions_rx.try_recv() {
            Ok(completion) => completion,
            Err(_) if self.in_flight.is_empty() => return None,
            Err(_) => self.completions_rx.recv().await?,
        };
        Some(self.handle_route_completion(completion))
    }

    /// Applies completions until no calculation is outstanding.
    pub async fn settle(&mut self) -> Vec<RouteUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = self.next_completion().await {
            updates.push(update);
        }
        updates
    }

    fn deliver(&self, signals: &[PresentationSignal]) {
        for signal in signals {
            signal.deliver(self.presenter.as_ref());
        }
    }

    /// Returns a snapshot of the tracking state.
    pub fn state(&self) -> TrackingState {
        TrackingState {
            current_route: self.monitor.current_route().cloned(),
            predefined_route: self.monitor.predefined_route().cloned(),
            is_user_in_safe_region: self.tracker.is_user_in_safe_region(),
            is_off_route: self.monitor.is_off_route(),
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Number of spawned calculations not yet processed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

async fn register_region<L: LocationProvider>(
    id: SessionId,
    region: SafeRegion,
    provider: &L,
) -> Result<()> {
    provider
        .monitor_region(&region.id, region.center, region.threshold_m)
        .await
        .map_err(TrackingError::LocationUnavailable)?;

    info!(
        "Session {} monitoring region '{}' at {} (radius {:.1}m)",
        id, region.id, region.center, region.threshold_m
    );
    Ok(())
}
