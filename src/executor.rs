use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, debug, error, info_span};

use crate::{AsyncPhaseConfig, BoxRunnable, PhaseError, TaskGraph};

/// Runs the tasks of an async phase.
///
/// Every task is spawned up front. Each one first waits for the completion
/// signal of all of its predecessors, then takes a concurrency slot and runs
/// its body. A task that fails drops its signal without firing it, so the
/// tasks downstream of it observe a closed channel and return without running.
pub struct AsyncExecutor {
    config: AsyncPhaseConfig,
}

impl AsyncExecutor {
    pub fn new(config: AsyncPhaseConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    /// Resolves once every task has finished, or with the first task error.
    ///
    /// On error the remaining tasks are detached rather than aborted: siblings
    /// that do not depend on the failed task still run to completion.
    pub async fn execute<P>(&self, graph: TaskGraph<BoxRunnable<P>>, param: P) -> Result<(), PhaseError>
    where
        P: Clone + Send + Sync + 'static,
    {
        let (phase_id, nodes, _) = graph.into_parts();
        let span = info_span!("phase", phase = %phase_id);

        // One completion signal per task. `true` once the body has returned Ok.
        let (mut senders, receivers): (Vec<_>, Vec<_>) = nodes
            .iter()
            .map(|_| {
                let (tx, rx) = watch::channel(false);
                (Some(tx), rx)
            })
            .unzip();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut handles: JoinSet<Result<(), PhaseError>> = JoinSet::new();

        for (index, node) in nodes.into_iter().enumerate() {
            let waits: Vec<watch::Receiver<bool>> = node
                .predecessors
                .iter()
                .map(|&dep| receivers[dep].clone())
                .collect();
            let done = senders[index].take();
            let semaphore = Arc::clone(&semaphore);
            let param = param.clone();
            let phase_id = phase_id.clone();

            handles.spawn(
                async move {
                    for mut wait in waits {
                        let closed = wait.wait_for(|finished| *finished).await.is_err();
                        if closed {
                            debug!(task = %node.id, "predecessor did not complete, skipping");
                            return Ok(());
                        }
                    }

                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return Ok(());
                    };

                    debug!(task = %node.id, "task started");
                    let started = Instant::now();
                    match node.body.run(param).await {
                        Ok(()) => {
                            debug!(
                                task = %node.id,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "task finished"
                            );
                            if let Some(done) = done {
                                done.send_replace(true);
                            }
                            Ok(())
                        }
                        Err(err) => {
                            error!(phase = %phase_id, task = %node.id, error = %err, "task failed");
                            Err(PhaseError::Task(err))
                        }
                    }
                }
                .instrument(span.clone()),
            );
        }
        drop(receivers);

        while let Some(joined) = handles.join_next().await {
            if let Err(err) = settle(joined) {
                handles.detach_all();
                return Err(err);
            }
        }

        Ok(())
    }
}

/// Maps a joined task onto the phase result. A panic is resumed on the
/// caller; a task cancelled before finishing is reported as a task error.
fn settle(joined: Result<Result<(), PhaseError>, JoinError>) -> Result<(), PhaseError> {
    match joined {
        Ok(outcome) => outcome,
        Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
        Err(join_err) => {
            error!(error = %join_err, "task did not finish");
            Err(PhaseError::Task(Box::new(join_err)))
        }
    }
}

impl Default for AsyncExecutor {
    fn default() -> Self {
        Self::new(AsyncPhaseConfig::default())
    }
}
