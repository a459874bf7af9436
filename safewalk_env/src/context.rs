//! Time and task spawning for a tracking session.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Where a session gets its clock and runs its background work.
///
/// The session never touches `tokio::time` or `tokio::spawn` directly, so
/// the same code replays under a virtual clock.
///
/// # Implementations
///
/// - **Live**: `TokioContext` - real clock, tokio tasks
/// - **Simulation**: `SimContext` - clock advanced per fix by the harness
#[async_trait]
pub trait TrackingContext: Send + Sync + 'static {
    /// Time elapsed since the context was created (virtual in simulation).
    fn now(&self) -> Duration;

    /// Waits for `duration`. A simulated context only advances its clock.
    async fn sleep(&self, duration: Duration);

    /// Runs `future` in the background.
    ///
    /// Route calculations run here; the session keeps the handle so it can
    /// abort a calculation that a newer request has superseded.
    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static;

    /// Seed the run was started with (0 for a live session).
    fn seed(&self) -> u64;
}
