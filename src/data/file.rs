use super::{DataManager, ResultQuery};
use crate::error::{HarvesterError, Result};
use crate::results::TaskResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const RESULTS_FILE: &str = "results.jsonl";
const SYNC_INTERVAL: Duration = Duration::from_secs(1);

struct LogWriter {
    file: BufWriter<File>,
    last_sync: Instant,
}

/// Append-only JSON-lines backend. One record per line in `<dir>/results.jsonl`.
pub struct JsonFileDataManager {
    dir: PathBuf,
    writer: Mutex<Option<LogWriter>>,
    index: RwLock<Vec<TaskResult>>,
    initialized: AtomicBool,
}

impl JsonFileDataManager {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            writer: Mutex::new(None),
            index: RwLock::new(Vec::new()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn results_path(&self) -> PathBuf {
        self.dir.join(RESULTS_FILE)
    }

    fn storage_error(message: String) -> HarvesterError {
        HarvesterError::storage("file".to_string(), message)
    }

    /// Read previously persisted records, skipping lines that do not parse
    async fn load_existing(path: &Path) -> Result<Vec<TaskResult>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path).await.map_err(|e| {
            Self::storage_error(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let mut lines = BufReader::new(file).lines();
        let mut records = Vec::new();
        let mut line_number = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TaskResult>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping malformed record at {}:{}: {}",
                    path.display(),
                    line_number,
                    e
                ),
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl DataManager for JsonFileDataManager {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Self::storage_error(format!(
                "Failed to create results directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let path = self.results_path();
        let existing = Self::load_existing(&path).await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                Self::storage_error(format!("Failed to open {}: {}", path.display(), e))
            })?;

        info!(
            "Opened results log {} ({} existing records)",
            path.display(),
            existing.len()
        );

        *self.index.write().await = existing;
        *self.writer.lock().await = Some(LogWriter {
            file: BufWriter::new(file),
            last_sync: Instant::now(),
        });
        self.initialized.store(true, Ordering::SeqCst);

        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn persist(&self, result: TaskResult) -> Result<()> {
        let mut line = serde_json::to_vec(&result)?;
        line.push(b'\n');

        {
            let mut guard = self.writer.lock().await;
            let writer = guard.as_mut().ok_or_else(|| HarvesterError::NotInitialized {
                backend: self.backend().to_string(),
            })?;

            writer.file.write_all(&line).await.map_err(|e| {
                Self::storage_error(format!("Failed to append result: {}", e))
            })?;
            writer.file.flush().await?;

            // Sync to disk at most once per interval
            if writer.last_sync.elapsed() > SYNC_INTERVAL {
                writer.file.get_ref().sync_data().await?;
                writer.last_sync = Instant::now();
                debug!("Synced results log to disk");
            }
        }

        self.index.write().await.push(result);
        Ok(())
    }

    async fn query(&self, query: &ResultQuery) -> Result<Vec<TaskResult>> {
        if !self.is_initialized() {
            return Err(HarvesterError::NotInitialized {
                backend: self.backend().to_string(),
            });
        }
        let index = self.index.read().await;
        Ok(query.apply(index.iter()))
    }

    async fn teardown(&self) -> Result<()> {
        self.initialized.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.file.flush().await.map_err(|e| {
                Self::storage_error(format!("Failed to flush results log: {}", e))
            })?;
            writer.file.get_ref().sync_all().await.map_err(|e| {
                Self::storage_error(format!("Failed to sync results log: {}", e))
            })?;
        }

        info!("Closed results log {}", self.results_path().display());
        Ok(())
    }
}
