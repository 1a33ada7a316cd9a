//! Completion protocol shared by the dispatcher and the aggregator.
//!
//! Both queues carry [`Signal`] values. `Signal::Done` is the sentinel: it is
//! enqueued exactly once per queue, after the last real item. The job queue's
//! sentinel stops scheduling; the result queue's sentinel is only sent after
//! every started worker has finished, and stops aggregation.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::job::{Batch, Job, Pinned};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal<T> {
    Item(T),
    Done,
}

pub type JobSender = mpsc::UnboundedSender<Signal<Job>>;
pub type JobReceiver = mpsc::UnboundedReceiver<Signal<Job>>;
pub type ResultSender = mpsc::UnboundedSender<Signal<Pinned>>;
pub type ResultReceiver = mpsc::UnboundedReceiver<Signal<Pinned>>;

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Jobs may still be enqueued.
    Dispatching,
    /// The job source is exhausted; waiting for in-flight workers.
    Draining,
    /// The aggregator has seen the result sentinel.
    Done,
}

/// Shared phase cell. Transitions only move forward.
#[derive(Debug, Clone)]
pub struct Completion {
    phase: Arc<watch::Sender<Phase>>,
}

impl Completion {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(watch::Sender::new(Phase::Dispatching)),
        }
    }

    pub fn advance(&self, next: Phase) {
        self.phase.send_if_modified(|current| {
            if next > *current {
                tracing::debug!(from = ?*current, to = ?next, "pipeline phase changed");
                *current = next;
                true
            } else {
                false
            }
        });
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of a pipeline's job queue.
///
/// Cloning is not allowed: `finish` consumes the feed, so the job sentinel is
/// sent at most once and always after every job pushed through this handle.
#[derive(Debug)]
pub struct JobFeed {
    jobs: JobSender,
    pushed: usize,
}

impl JobFeed {
    pub(crate) fn new(jobs: JobSender) -> Self {
        Self { jobs, pushed: 0 }
    }

    /// Enqueue one job. Returns false once the dispatcher has stopped.
    pub fn push(&mut self, job: Job) -> bool {
        if self.jobs.send(Signal::Item(job)).is_err() {
            return false;
        }
        self.pushed += 1;
        true
    }

    /// Enqueue every job of a batch, in order. Returns how many were accepted.
    pub fn extend(&mut self, batch: Batch) -> usize {
        let mut accepted = 0;
        for job in batch {
            if !self.push(job) {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Number of jobs accepted so far.
    pub fn pushed(&self) -> usize {
        self.pushed
    }

    /// Signal end-of-input.
    pub fn finish(self) {
        if self.jobs.send(Signal::Done).is_err() {
            tracing::debug!("dispatcher already stopped before end of input");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_phase_only_moves_forward() {
        let completion = Completion::new();
        assert_eq!(completion.phase(), Phase::Dispatching);

        completion.advance(Phase::Done);
        completion.advance(Phase::Draining);
        assert_eq!(completion.phase(), Phase::Done);
    }

    #[tokio::test]
    async fn test_phase_subscribers_see_transitions() {
        let completion = Completion::new();
        let mut rx = completion.subscribe();

        completion.advance(Phase::Draining);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Phase::Draining);
    }

    #[test]
    fn test_feed_sends_sentinel_last() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut feed = JobFeed::new(tx);
        let job = Job::new("a", Url::parse("http://x/a").unwrap());

        assert!(feed.push(job.clone()));
        assert_eq!(feed.pushed(), 1);
        feed.finish();

        assert_eq!(rx.try_recv().unwrap(), Signal::Item(job));
        assert_eq!(rx.try_recv().unwrap(), Signal::Done);
        // Feed is gone, so the channel is closed after the sentinel.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_feed_reports_stopped_dispatcher() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut feed = JobFeed::new(tx);

        assert!(!feed.push(Job::new("a", Url::parse("http://x/a").unwrap())));
        assert_eq!(feed.pushed(), 0);
        feed.finish();
    }
}
