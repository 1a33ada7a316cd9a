use super::protocol::{Completion, JobReceiver, Phase, ResultSender, Signal};
use crate::utils::limited_spawner::LimitedSpawner;
use crate::worker::Worker;

/// Scheduling loop: one worker per job until the job sentinel, then wait for
/// every started worker before sending the result sentinel.
///
/// A feed dropped without `finish` is treated like end-of-input.
pub(crate) async fn run(
    mut jobs: JobReceiver,
    results: ResultSender,
    worker: Worker,
    spawner: LimitedSpawner,
    completion: Completion,
) {
    let mut dispatched = 0usize;

    loop {
        let job = match jobs.recv().await {
            Some(Signal::Item(job)) => job,
            Some(Signal::Done) => break,
            None => {
                tracing::warn!("job feed dropped without end of input");
                break;
            }
        };

        let worker = worker.clone();
        let results = results.clone();
        let spawned = spawner
            .spawn(async move {
                let name = job.name.clone();
                match worker.run(job).await {
                    Ok(pinned) => {
                        if results.send(Signal::Item(pinned)).is_err() {
                            tracing::debug!(job = %name, "result queue closed, discarding result");
                        }
                    }
                    Err(err) => tracing::error!(job = %name, error = %err, "job dropped"),
                }
            })
            .await;

        if let Err(err) = spawned {
            tracing::error!(error = %err, "worker pool closed");
            break;
        }
        dispatched += 1;
    }

    jobs.close();
    completion.advance(Phase::Draining);
    tracing::debug!(dispatched, in_flight = spawner.in_flight(), "finished dispatching");

    spawner.close_and_wait().await;

    if results.send(Signal::Done).is_err() {
        tracing::debug!("result queue closed before the last worker finished");
    }
    tracing::debug!(dispatched, "all workers finished");
}
