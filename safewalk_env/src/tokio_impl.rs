//! `TrackingContext` on the tokio runtime.

use crate::TrackingContext;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Context for a live session: real clock, tokio tasks.
///
/// `now()` is measured from construction, so a session's timestamps read
/// as "time since tracking started".
#[derive(Debug, Clone, Copy)]
pub struct TokioContext {
    started: Instant,
}

impl TokioContext {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackingContext for TokioContext {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }

    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let span = tracing::debug_span!("task", name = %name);
        tokio::spawn(future.instrument(span))
    }

    fn seed(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_now_tracks_real_sleep() {
        let ctx = TokioContext::new();
        let before = ctx.now();

        ctx.sleep(Duration::from_millis(10)).await;

        assert!(ctx.now() - before >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_spawn_returns_abortable_handle() {
        let ctx = TokioContext::new();

        let handle = ctx.spawn("never-finishes", std::future::pending());
        handle.abort();

        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[test]
    fn test_unseeded() {
        assert_eq!(TokioContext::default().seed(), 0);
    }
}
