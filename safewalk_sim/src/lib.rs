//! SafeWalk Deterministic Simulation Testing (DST) Harness
//!
//! Runs the real `TrackingSession` against simulated collaborators so a
//! whole walk to school replays identically from a single seed.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advanced per fix, and by routing latency unless
//!   the context is driven (then routing waits for the fix stream)
//! - **Routing**: Straight-line directions with scripted outages, or
//!   answers released by hand in any order
//! - **Location**: GPS noise and geofence events derived from a seeded walker
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                          │
//! │                                                             │
//! │  Walker ──fixes──► TrackingSession ──► RecordingPresenter   │
//! │  (ground truth)         │    ▲                              │
//! │                         ▼    │                              │
//! │                  SimRoutingClient / ManualRoutingClient     │
//! │                         (SimContext virtual clock)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use safewalk_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Detour);
//! assert!(result.passed);
//! ```

mod context;
mod location;
mod presenter;
mod routing;
mod walker;
pub mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use location::{LocationFeed, MonitoredRegion, ScriptedLocationProvider};
pub use presenter::RecordingPresenter;
pub use routing::{straight_polyline, ManualRoutingClient, SimRoutingClient, SimRoutingConfig};
pub use runner::{ScenarioError, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use walker::{Geofence, Walker};
