use super::{DataManager, ResultQuery};
use crate::error::{HarvesterError, Result};
use crate::results::TaskResult;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Volatile backend keeping results in process memory
pub struct MemoryDataManager {
    records: RwLock<Vec<TaskResult>>,
    initialized: AtomicBool,
}

impl MemoryDataManager {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            initialized: AtomicBool::new(false),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(HarvesterError::NotInitialized {
                backend: self.backend().to_string(),
            })
        }
    }
}

impl Default for MemoryDataManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataManager for MemoryDataManager {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn init(&self) -> Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        debug!("Memory data manager ready");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn persist(&self, result: TaskResult) -> Result<()> {
        self.ensure_initialized()?;
        self.records.write().await.push(result);
        Ok(())
    }

    async fn query(&self, query: &ResultQuery) -> Result<Vec<TaskResult>> {
        self.ensure_initialized()?;
        let records = self.records.read().await;
        Ok(query.apply(records.iter()))
    }

    async fn teardown(&self) -> Result<()> {
        self.initialized.store(false, Ordering::SeqCst);
        info!(
            "Memory data manager torn down ({} results discarded)",
            self.records.read().await.len()
        );
        Ok(())
    }
}
