use serde::{Deserialize, Serialize};

const DEFAULT_MAX_CONCURRENCY: usize = 1024;

/// Settings bound to an async phase when it is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsyncPhaseConfig {
    /// Upper bound on task bodies running at the same time. A task only takes
    /// a slot once all of its predecessors have finished.
    pub max_concurrency: usize,
}

impl Default for AsyncPhaseConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl AsyncPhaseConfig {
    /// Replaces unusable values with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.max_concurrency == 0 {
            self.max_concurrency = DEFAULT_MAX_CONCURRENCY;
        }
        self
    }
}
