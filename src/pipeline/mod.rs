//! Job dispatch and result aggregation.
//!
//! ```text
//! JobFeed --Signal<Job>--> dispatcher --spawn--> Worker(s) --Signal<Pinned>--> Aggregator
//! ```
//!
//! Each call to [`Pipeline::start`] creates an independent run with its own
//! queues, pool and [`Phase`].

mod aggregator;
mod dispatcher;
mod job;
mod protocol;

pub use aggregator::Aggregator;
pub use job::{Batch, Job, Pinned, ResultMap};
pub use protocol::{Completion, JobFeed, Phase, Signal};

use tokio::sync::mpsc;

use crate::utils::limited_spawner::LimitedSpawner;
use crate::worker::Worker;

#[derive(Clone)]
pub struct Pipeline {
    worker: Worker,
    concurrency: Option<usize>,
}

impl Pipeline {
    /// `concurrency` caps how many workers run at once per run; `None` starts
    /// every job immediately.
    pub fn new(worker: Worker, concurrency: Option<usize>) -> Self {
        Self {
            worker,
            concurrency,
        }
    }

    /// Spawn the scheduling loop for a new run and hand back both ends.
    pub fn start(&self) -> (JobFeed, Aggregator) {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let completion = Completion::new();

        tokio::spawn(dispatcher::run(
            job_rx,
            result_tx,
            self.worker.clone(),
            LimitedSpawner::with_limit(self.concurrency),
            completion.clone(),
        ));

        (JobFeed::new(job_tx), Aggregator::new(result_rx, completion))
    }

    /// Run one batch to completion. Failed jobs are missing from the map.
    pub async fn run_batch(&self, batch: Batch) -> ResultMap {
        let (mut feed, aggregator) = self.start();
        let jobs = feed.extend(batch);
        feed.finish();

        let hashes = aggregator.collect().await;
        tracing::info!(jobs, pinned = hashes.len(), "batch finished");
        hashes
    }
}
