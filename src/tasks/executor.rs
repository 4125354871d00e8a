use super::TaskSpec;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Unit of work a task runs on each tick
#[async_trait]
pub trait Executor: Send + Sync {
    /// Produce the result payload for one run of `spec`
    async fn execute(&self, spec: &TaskSpec) -> Result<serde_json::Value>;
}

pub type ExecutorConstructor = fn() -> Arc<dyn Executor>;

/// Maps stable executor keys to constructors. Resolved once at startup.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    constructors: BTreeMap<String, ExecutorConstructor>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the executors shipped in this crate
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("echo", || Arc::new(EchoExecutor));
        registry.register("heartbeat", || Arc::new(HeartbeatExecutor::default()));
        registry
    }

    pub fn register(&mut self, key: impl Into<String>, constructor: ExecutorConstructor) {
        let key = key.into();
        if self.constructors.insert(key.clone(), constructor).is_some() {
            warn!("Executor '{}' registered twice, keeping the latest", key);
        } else {
            debug!("Registered executor '{}'", key);
        }
    }

    /// Construct the executor registered under `key`
    pub fn resolve(&self, key: &str) -> Option<Arc<dyn Executor>> {
        self.constructors.get(key).map(|construct| construct())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.constructors.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

/// Returns the task parameters unchanged
pub struct EchoExecutor;

#[async_trait]
impl Executor for EchoExecutor {
    async fn execute(&self, spec: &TaskSpec) -> Result<serde_json::Value> {
        Ok(spec.params.clone())
    }
}

/// Emits a timestamp and a monotonically increasing beat counter
#[derive(Default)]
pub struct HeartbeatExecutor {
    beats: AtomicU64,
}

#[async_trait]
impl Executor for HeartbeatExecutor {
    async fn execute(&self, spec: &TaskSpec) -> Result<serde_json::Value> {
        let beat = self.beats.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(serde_json::json!({
            "task": spec.name,
            "beat": beat,
            "at": Utc::now().to_rfc3339(),
        }))
    }
}
