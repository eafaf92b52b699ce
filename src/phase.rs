use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cascade::SyncExecutor;
use crate::executor::AsyncExecutor;
use crate::{
    AsyncPhaseConfig, BoxError, BoxRunnable, BoxRunnableSync, FnRunnable, FnRunnableSync, PhaseError, TaskGraph,
    resolve, validate,
};

/// A named extension point whose tasks run concurrently on tokio.
///
/// Registrations accumulate on the phase; every call to [`AsyncPhase::run`]
/// resolves and validates a fresh snapshot of them, so nothing carries over
/// between invocations.
pub struct AsyncPhase<P: Send + 'static> {
    id: String,
    config: AsyncPhaseConfig,
    runnables: Vec<BoxRunnable<P>>,
}

/// A named extension point whose tasks run synchronously on the caller's
/// stack. Used where suspension is not available.
pub struct SyncPhase<P> {
    id: String,
    runnables: Vec<BoxRunnableSync<P>>,
}

pub fn define_async_phase<P>(id: impl Into<String>) -> AsyncPhase<P>
where
    P: Clone + Send + Sync + 'static,
{
    AsyncPhase::new(id)
}

pub fn define_sync_phase<P>(id: impl Into<String>) -> SyncPhase<P> {
    SyncPhase::new(id)
}

fn owned_ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

impl<P> AsyncPhase<P>
where
    P: Clone + Send + Sync + 'static,
{
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_config(id, AsyncPhaseConfig::default())
    }

    pub fn with_config(id: impl Into<String>, config: AsyncPhaseConfig) -> Self {
        Self {
            id: id.into(),
            config: config.normalized(),
            runnables: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &AsyncPhaseConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.runnables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runnables.is_empty()
    }

    /// Contributes a task whose body is an async closure. `run_after` names
    /// tasks of this phase, registered now or later, that must finish first.
    pub fn register<F, Fut>(&mut self, task_id: impl Into<String>, body: F, run_after: &[&str]) -> &mut Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.register_runnable(Arc::new(FnRunnable::new(task_id, owned_ids(run_after), body)))
    }

    pub fn register_runnable(&mut self, runnable: BoxRunnable<P>) -> &mut Self {
        self.runnables.push(runnable);
        self
    }

    /// Resolves and validates the current registrations.
    pub fn graph(&self) -> Result<TaskGraph<BoxRunnable<P>>, PhaseError> {
        let graph = resolve(&self.id, self.runnables.iter().cloned())
            .and_then(|graph| validate(&self.id, &graph).map(|()| graph));
        if let Err(err) = &graph {
            warn!(phase = %self.id, error = %err, "phase rejected");
        }
        graph
    }

    pub fn validate(&self) -> Result<(), PhaseError> {
        self.graph().map(|_| ())
    }

    /// Runs every registered task once, honouring `run_after`. Configuration
    /// errors are returned before any task body is entered.
    pub async fn run(&self, param: P) -> Result<(), PhaseError> {
        let graph = self.graph()?;
        info!(phase = %self.id, tasks = graph.len(), "running async phase");
        debug!(phase = %self.id, order = ?graph.topological_order(), "planned order");
        AsyncExecutor::new(self.config.clone()).execute(graph, param).await
    }
}

impl<P> SyncPhase<P> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            runnables: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.runnables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runnables.is_empty()
    }

    pub fn register<F>(&mut self, task_id: impl Into<String>, body: F, run_after: &[&str]) -> &mut Self
    where
        F: Fn(&P) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.register_runnable(Arc::new(FnRunnableSync::new(task_id, owned_ids(run_after), body)))
    }

    pub fn register_runnable(&mut self, runnable: BoxRunnableSync<P>) -> &mut Self {
        self.runnables.push(runnable);
        self
    }

    pub fn graph(&self) -> Result<TaskGraph<BoxRunnableSync<P>>, PhaseError> {
        let graph = resolve(&self.id, self.runnables.iter().cloned())
            .and_then(|graph| validate(&self.id, &graph).map(|()| graph));
        if let Err(err) = &graph {
            warn!(phase = %self.id, error = %err, "phase rejected");
        }
        graph
    }

    pub fn validate(&self) -> Result<(), PhaseError> {
        self.graph().map(|_| ())
    }

    /// Runs every registered task once before returning.
    pub fn run(&self, param: &P) -> Result<(), PhaseError> {
        let graph = self.graph()?;
        info!(phase = %self.id, tasks = graph.len(), "running sync phase");
        debug!(phase = %self.id, order = ?graph.topological_order(), "planned order");
        SyncExecutor::new().execute(graph, param)
    }
}
