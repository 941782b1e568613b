//! Detached work that must outlive the response it was started for.

use std::future::Future;
use std::time::Duration;

use tokio_util::task::TaskTracker;

/// Tracks background writes (storage puts, edge-cache inserts, error logs)
/// so shutdown can wait for them instead of dropping them.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `fut` to completion in the background; failures are logged.
    pub fn spawn<F>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tracker.spawn(async move {
            if let Err(err) = fut.await {
                tracing::warn!(task = label, error = %err, "background task failed");
            }
        });
    }

    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Waits for every in-flight task. Returns `false` when `limit` ran out
    /// first. Tasks spawned after closing still run but are not awaited.
    pub async fn drain(&self, limit: Duration) -> bool {
        self.tracker.close();
        let finished = tokio::time::timeout(limit, self.tracker.wait()).await.is_ok();
        self.tracker.reopen();
        if !finished {
            tracing::warn!(pending = self.tracker.len(), "background tasks still running");
        }
        finished
    }
}
