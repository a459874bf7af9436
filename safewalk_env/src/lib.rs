//! SafeWalk Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" boundary that lets the SafeWalk
//! tracking logic run against real platform services in production and
//! against scripted collaborators in the simulation harness.
//!
//! # Collaborators
//!
//! Everything the tracking core does not own is intercepted here:
//! - Time and task spawning (`TrackingContext`)
//! - Position and geofence events (`LocationProvider`)
//! - Walking directions (`RoutingClient`)
//! - Visual signals (`Presenter`)
//!
//! # Example
//!
//! ```ignore
//! use safewalk_env::{LocationEvent, LocationProvider};
//!
//! async fn pump<L: LocationProvider>(provider: &L) {
//!     while let Some(event) = provider.next_event().await {
//!         match event {
//!             LocationEvent::Position(p) => handle_position(p),
//!             LocationEvent::RegionEntered(id) => enter(id),
//!             LocationEvent::RegionExited(id) => exit(id),
//!         }
//!     }
//! }
//! ```

mod context;
mod error;
mod location;
mod presenter;
mod routing;
mod tokio_impl;
mod types;

pub use context::TrackingContext;
pub use error::EnvError;
pub use location::{LocationEvent, LocationProvider};
pub use presenter::Presenter;
pub use routing::RoutingClient;
pub use tokio_impl::TokioContext;
pub use types::{Coordinate, Route, RouteRequest, SessionId, TransportMode};
