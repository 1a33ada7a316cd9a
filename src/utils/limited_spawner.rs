use std::future::Future;
use std::sync::Arc;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Spawns tasks, optionally capped at `max_concurrent` running at once, and
/// keeps track of them so a caller can wait until every spawned task is done.
pub struct LimitedSpawner {
    semaphore: Option<Arc<Semaphore>>,
    tracker: TaskTracker,
}

impl LimitedSpawner {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Some(Arc::new(Semaphore::new(max_concurrent))),
            tracker: TaskTracker::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            semaphore: None,
            tracker: TaskTracker::new(),
        }
    }

    pub fn with_limit(limit: Option<usize>) -> Self {
        match limit {
            Some(max_concurrent) => Self::new(max_concurrent),
            None => Self::unbounded(),
        }
    }

    /// Waits for a free slot when bounded, then spawns `f`.
    pub async fn spawn<F>(&self, f: F) -> Result<JoinHandle<F::Output>, AcquireError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = match &self.semaphore {
            Some(semaphore) => {
                let permit = Arc::clone(semaphore).acquire_owned().await?;
                self.tracker.spawn(async move {
                    let _permit = permit;
                    f.await
                })
            }
            None => self.tracker.spawn(f),
        };
        Ok(handle)
    }

    /// Number of spawned tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stops accepting new work and waits for every spawned task to finish.
    pub async fn close_and_wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
