use crate::data::DataManager;
use crate::error::Result;
use crate::tasks::TaskSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Outcome of a single task execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Succeeded,
    Failed,
}

/// Persisted record of one task execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: Uuid,
    pub task: String,
    pub executor: String,
    pub status: ResultStatus,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn succeeded(
        spec: &TaskSpec,
        payload: serde_json::Value,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: spec.name.clone(),
            executor: spec.executor.clone(),
            status: ResultStatus::Succeeded,
            payload,
            error: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(spec: &TaskSpec, error: String, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: spec.name.clone(),
            executor: spec.executor.clone(),
            status: ResultStatus::Failed,
            payload: serde_json::Value::Null,
            error: Some(error),
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Succeeded
    }
}

/// Hands executor outcomes to the data manager
#[derive(Clone)]
pub struct ResultHandler {
    data_manager: Arc<dyn DataManager>,
}

impl ResultHandler {
    pub fn new(data_manager: Arc<dyn DataManager>) -> Self {
        Self { data_manager }
    }

    /// Record an execution outcome. Persistence failures are logged, not returned.
    pub async fn handle(
        &self,
        spec: &TaskSpec,
        outcome: Result<serde_json::Value>,
        started_at: DateTime<Utc>,
    ) {
        let result = match outcome {
            Ok(payload) => TaskResult::succeeded(spec, payload, started_at),
            Err(e) => {
                warn!("Task '{}' failed: {}", spec.name, e);
                TaskResult::failed(spec, e.to_string(), started_at)
            }
        };

        debug!(
            "Persisting {:?} result {} for task '{}'",
            result.status, result.id, result.task
        );

        if let Err(e) = self.data_manager.persist(result).await {
            warn!(
                "Failed to persist result for task '{}' via {}: {}",
                spec.name,
                self.data_manager.backend(),
                e
            );
        }
    }

    pub fn data_manager(&self) -> &Arc<dyn DataManager> {
        &self.data_manager
    }
}
