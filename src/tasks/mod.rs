//! Task definitions, executors and the interval scheduler.

mod executor;
mod loader;
mod master;

pub use executor::{
    EchoExecutor, Executor, ExecutorConstructor, ExecutorRegistry, HeartbeatExecutor,
};
pub use loader::{load_task_dir, parse_task_file};
pub use master::{IntervalTaskMaster, TaskMaster};

use crate::error::{HarvesterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Longest accepted schedule interval, one year
pub const MAX_INTERVAL_SECS: u64 = 366 * 86_400;

/// Ordered registry of task definitions keyed by task name
pub type TaskRegistry = BTreeMap<String, TaskSpec>;

/// Definition of one scheduled task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,

    /// Key of the executor in the [`ExecutorRegistry`]
    pub executor: String,

    /// Seconds between runs
    pub interval_secs: u64,

    /// Run once as soon as scheduling begins instead of after the first interval
    #[serde(default = "default_run_immediately")]
    pub run_immediately: bool,

    /// Executor-specific parameters
    #[serde(default)]
    pub params: serde_json::Value,
}

fn default_run_immediately() -> bool {
    true
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, executor: impl Into<String>, interval_secs: u64) -> Self {
        Self {
            name: name.into(),
            executor: executor.into(),
            interval_secs,
            run_immediately: default_run_immediately(),
            params: serde_json::Value::Null,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(HarvesterError::component("tasks", "Task name must not be empty"));
        }
        if self.executor.trim().is_empty() {
            return Err(HarvesterError::component(
                "tasks".to_string(),
                format!("Task '{}' has no executor", self.name),
            ));
        }
        if self.interval_secs == 0 {
            return Err(HarvesterError::component(
                "tasks".to_string(),
                format!("Task '{}' interval must be greater than 0", self.name),
            ));
        }
        if self.interval_secs > MAX_INTERVAL_SECS {
            return Err(HarvesterError::component(
                "tasks".to_string(),
                format!(
                    "Task '{}' interval {}s exceeds the maximum of {}s",
                    self.name, self.interval_secs, MAX_INTERVAL_SECS
                ),
            ));
        }
        Ok(())
    }
}
