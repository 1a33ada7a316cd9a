use tokio::sync::watch;

use super::job::{Pinned, ResultMap};
use super::protocol::{Completion, Phase, ResultReceiver, Signal};

/// Sole consumer of a pipeline's result queue.
///
/// Batch callers use [`collect`](Self::collect); the streaming writer pulls
/// one result at a time with [`next`](Self::next).
pub struct Aggregator {
    results: ResultReceiver,
    completion: Completion,
    received: usize,
    done: bool,
}

impl Aggregator {
    pub(crate) fn new(results: ResultReceiver, completion: Completion) -> Self {
        Self {
            results,
            completion,
            received: 0,
            done: false,
        }
    }

    /// Next completed result, or `None` once the result sentinel was read.
    pub async fn next(&mut self) -> Option<Pinned> {
        if self.done {
            return None;
        }

        match self.results.recv().await {
            Some(Signal::Item(pinned)) => {
                self.received += 1;
                Some(pinned)
            }
            Some(Signal::Done) => {
                self.finish();
                None
            }
            None => {
                tracing::warn!("result queue closed without sentinel");
                self.finish();
                None
            }
        }
    }

    /// Drain every result into a map. Duplicate names keep the last one to
    /// complete.
    pub async fn collect(mut self) -> ResultMap {
        let mut hashes = ResultMap::new();
        while let Some(pinned) = self.next().await {
            hashes.insert(pinned.name, pinned.identifier);
        }
        hashes
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.completion.subscribe()
    }

    fn finish(&mut self) {
        self.done = true;
        self.results.close();
        self.completion.advance(Phase::Done);
    }
}
