//! Result persistence backends.
//!
//! A [`DataManager`] must complete [`DataManager::init`] before the engine can
//! start scheduling, and is torn down only during engine shutdown. Backends are
//! selected from configuration by [`create_data_manager`].

mod file;
mod memory;

pub use file::JsonFileDataManager;
pub use memory::MemoryDataManager;

use crate::config::StorageConfig;
use crate::error::{HarvesterError, Result};
use crate::results::TaskResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Persistence backend for task results
#[async_trait]
pub trait DataManager: Send + Sync {
    /// Short backend name for logging
    fn backend(&self) -> &'static str;

    /// Prepare the backend. Must complete before any result is persisted.
    async fn init(&self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    async fn persist(&self, result: TaskResult) -> Result<()>;

    async fn query(&self, query: &ResultQuery) -> Result<Vec<TaskResult>>;

    /// Flush and release backend resources
    async fn teardown(&self) -> Result<()>;
}

/// Filter for stored results. Matches are returned newest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultQuery {
    pub task: Option<String>,
    pub limit: Option<usize>,
}

impl ResultQuery {
    pub fn for_task(task: impl Into<String>) -> Self {
        Self {
            task: Some(task.into()),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, result: &TaskResult) -> bool {
        self.task.as_deref().map_or(true, |task| result.task == task)
    }

    /// Filter, order and truncate a set of records
    pub fn apply<'a, I>(&self, records: I) -> Vec<TaskResult>
    where
        I: IntoIterator<Item = &'a TaskResult>,
    {
        let mut matched: Vec<TaskResult> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

/// Configured backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    File,
}

impl FromStr for BackendKind {
    type Err = HarvesterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "file" | "jsonl" => Ok(BackendKind::File),
            _ => Err(HarvesterError::UnknownBackend {
                kind: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => f.write_str("memory"),
            BackendKind::File => f.write_str("file"),
        }
    }
}

/// Build and initialize the configured backend
pub async fn create_data_manager(config: &StorageConfig) -> Result<Arc<dyn DataManager>> {
    let kind: BackendKind = config.backend.parse()?;
    info!("Creating '{}' data manager", kind);

    let manager: Arc<dyn DataManager> = match kind {
        BackendKind::Memory => Arc::new(MemoryDataManager::new()),
        BackendKind::File => Arc::new(JsonFileDataManager::new(PathBuf::from(&config.path))),
    };

    manager.init().await?;
    info!("Data manager '{}' initialized", manager.backend());

    Ok(manager)
}
