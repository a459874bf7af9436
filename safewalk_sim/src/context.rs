//! Virtual-clock context for deterministic walks.

use async_trait::async_trait;
use safewalk_env::TrackingContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{trace, Instrument};

/// `TrackingContext` whose clock only moves when told to.
///
/// The runner advances it once per fix. A plain context lets `sleep`
/// advance it too, so simulated routing finishes at once; a driven context
/// makes `sleep` wait until the runner has moved the clock far enough.
/// Clones share the clock.
#[derive(Clone)]
pub struct SimContext {
    seed: u64,

    /// Nanoseconds since the walk started
    clock_ns: Arc<AtomicU64>,

    /// Only `advance_time` moves the clock
    driven: bool,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            clock_ns: Arc::new(AtomicU64::new(0)),
            driven: false,
        }
    }

    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Shared context whose `sleep` waits for the runner's clock.
    pub fn driven(seed: u64) -> Arc<Self> {
        Arc::new(Self {
            driven: true,
            ..Self::new(seed)
        })
    }

    /// Moves the virtual clock forward.
    pub fn advance_time(&self, duration: Duration) {
        self.clock_ns.fetch_add(nanos(duration), Ordering::SeqCst);
    }

    pub fn time_ns(&self) -> u64 {
        self.clock_ns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackingContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        if !self.driven {
            self.advance_time(duration);
            // Let the session observe the new time before we continue
            tokio::task::yield_now().await;
            return;
        }

        let deadline = self.time_ns().saturating_add(nanos(duration));
        while self.time_ns() < deadline {
            tokio::task::yield_now().await;
        }
    }

    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        trace!("spawn {} at t={:?}", name, self.now());
        tokio::spawn(future.instrument(tracing::trace_span!("sim_task", name = %name)))
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_zero_and_accumulates() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.time_ns(), 1_500_000_000);
    }

    #[tokio::test]
    async fn test_sleep_is_instant_but_moves_clock() {
        let ctx = SimContext::new(1);
        let wall = std::time::Instant::now();

        ctx.sleep(Duration::from_secs(30)).await;

        assert_eq!(ctx.now(), Duration::from_secs(30));
        assert!(wall.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_clones_share_clock() {
        let ctx = SimContext::new(12345);
        let other = ctx.clone();

        ctx.advance_time(Duration::from_secs(5));

        assert_eq!(other.now(), Duration::from_secs(5));
        assert_eq!(other.seed(), 12345);
    }

    #[tokio::test]
    async fn test_spawned_task_runs() {
        let ctx = SimContext::new(3);
        let (tx, rx) = tokio::sync::oneshot::channel();

        let handle = ctx.spawn("ping", async move {
            let _ = tx.send(7u32);
        });

        assert_eq!(rx.await.ok(), Some(7));
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_driven_sleep_waits_for_runner_clock() {
        let ctx = SimContext::driven(5);
        let sleeper = tokio::spawn({
            let ctx = ctx.clone();
            async move { ctx.sleep(Duration::from_millis(2500)).await }
        });
        tokio::task::yield_now().await;

        for _ in 0..2 {
            ctx.advance_time(Duration::from_secs(1));
            tokio::task::yield_now().await;
            assert!(!sleeper.is_finished());
        }
        assert_eq!(ctx.now(), Duration::from_secs(2));

        ctx.advance_time(Duration::from_secs(2));
        sleeper.await.unwrap();
        assert_eq!(ctx.now(), Duration::from_secs(4));
    }
}
