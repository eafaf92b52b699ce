pub mod task;
pub mod config;
pub mod resolve;
pub mod cycle_check;
pub mod executor;
pub mod cascade;
pub mod phase;
pub mod logging;

pub use task::{FnRunnable, FnRunnableSync, Runnable, RunnableSync};
pub use config::AsyncPhaseConfig;
pub use resolve::{Registration, TaskGraph, TaskNode, resolve};
pub use cycle_check::{has_cycle, validate};
pub use executor::AsyncExecutor;
pub use cascade::SyncExecutor;
pub use phase::{AsyncPhase, SyncPhase, define_async_phase, define_sync_phase};

use std::sync::Arc;
use thiserror::Error;

/// Error type task bodies return. It is handed back to the caller of
/// `run` inside [`PhaseError::Task`] without being wrapped or rewritten.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type BoxRunnable<P> = Arc<dyn Runnable<P>>;
pub type BoxRunnableSync<P> = Arc<dyn RunnableSync<P>>;

#[derive(Error, Debug)]
pub enum PhaseError {
    #[error("Circular dependency detected in phase '{phase_id}' between tasks {involved_task_ids:?}")]
    CycleDetected {
        phase_id: String,
        involved_task_ids: Vec<String>,
    },
    #[error("Task '{task_id}' in phase '{phase_id}' runs after '{missing_predecessor_id}', which is not registered in that phase")]
    UnresolvedPredecessor {
        phase_id: String,
        task_id: String,
        missing_predecessor_id: String,
    },
    #[error("Task '{task_id}' is registered more than once in phase '{phase_id}'")]
    DuplicateTaskId { phase_id: String, task_id: String },
    #[error("{0}")]
    Task(BoxError),
}

impl PhaseError {
    /// True for the errors raised while checking the registrations, before
    /// any task body was entered.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, PhaseError::Task(_))
    }

    /// The error returned by the failing task body, if that is what this is.
    pub fn into_task_error(self) -> Option<BoxError> {
        match self {
            PhaseError::Task(err) => Some(err),
            _ => None,
        }
    }
}
