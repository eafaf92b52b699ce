use std::mem;
use std::time::Instant;

use tracing::{debug, error, info_span};

use crate::resolve::TaskNode;
use crate::{BoxError, BoxRunnableSync, PhaseError, TaskGraph};

/// Runs the tasks of a sync phase without blocking or suspending.
///
/// Every task starts out waiting on all of its predecessors. Tasks without
/// predecessors are fired in registration order; finishing a task notifies
/// its dependents, and a dependent whose last predecessor just finished runs
/// on the same call stack.
///
/// A failing task does not fire its completion, so everything downstream of
/// it never runs. Tasks that do not depend on it still run; the first error
/// is returned once the cascade has settled.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncExecutor;

impl SyncExecutor {
    pub fn new() -> Self {
        Self
    }

    pub fn execute<P>(&self, graph: TaskGraph<BoxRunnableSync<P>>, param: &P) -> Result<(), PhaseError> {
        let (phase_id, nodes, dependents) = graph.into_parts();
        let span = info_span!("phase", phase = %phase_id);
        let _entered = span.enter();

        let mut cascade = Cascade {
            phase_id: &phase_id,
            nodes: &nodes,
            param,
            pending: nodes.iter().map(|node| node.predecessors.len()).collect(),
            subscribers: dependents,
            first_error: None,
        };

        for (index, node) in nodes.iter().enumerate() {
            if node.predecessors.is_empty() {
                cascade.fire(index);
            }
        }

        match cascade.first_error {
            Some(err) => Err(PhaseError::Task(err)),
            None => Ok(()),
        }
    }
}

/// Execution state of one sync phase invocation.
struct Cascade<'a, P> {
    phase_id: &'a str,
    nodes: &'a [TaskNode<BoxRunnableSync<P>>],
    param: &'a P,
    /// Predecessors each task is still waiting on.
    pending: Vec<usize>,
    /// Tasks to notify when the task at that index finishes. Drained on fire.
    subscribers: Vec<Vec<usize>>,
    first_error: Option<BoxError>,
}

impl<P> Cascade<'_, P> {
    fn fire(&mut self, index: usize) {
        let nodes = self.nodes;
        let node = &nodes[index];

        debug!(task = %node.id, "task started");
        let started = Instant::now();
        if let Err(err) = node.body.run(self.param) {
            error!(phase = %self.phase_id, task = %node.id, error = %err, "task failed");
            if self.first_error.is_none() {
                self.first_error = Some(err);
            }
            return;
        }
        debug!(
            task = %node.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "task finished"
        );

        for waiting in mem::take(&mut self.subscribers[index]) {
            self.pending[waiting] -= 1;
            if self.pending[waiting] == 0 {
                self.fire(waiting);
            }
        }
    }
}
