//! SafeWalk Core - route deviation detection for a child's walk to school
//!
//! Compares a stream of positions against a walking route to a fixed
//! destination, raises a "wrong way" alert when the child strays beyond a
//! tolerance, re-routes from where the child actually is, and tracks
//! arrival at the school safe region.
//!
//! # Modules
//!
//! - `route_monitor`: nearest-waypoint deviation check, route ownership
//!   and sequence-numbered recalculation
//! - `tracker`: safe-region classification and resting/alert signals
//! - `session`: the serialized event loop tying both to the environment

pub mod config;
pub mod error;
pub mod geometry;
pub mod region;
pub mod route_monitor;
pub mod session;
pub mod signals;
pub mod tracker;

// Re-export key types for convenience
pub use config::{AdherenceMode, RestingPolicy, StalenessPolicy, TrackingConfig};
pub use error::{Result, TrackingError};
pub use region::SafeRegion;
pub use route_monitor::{DeviationResult, MonitorOutcome, RouteMonitor, RouteTicket, RouteUpdate};
pub use session::{RouteCompletion, SessionStats, TrackingSession, TrackingState};
pub use signals::{PresentationSignal, VisibilityLatch};
pub use tracker::{LocationTracker, TrackerOutcome};
