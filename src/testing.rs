//! Test doubles for the engine's collaborators.

use crate::data::{DataManager, ResultQuery};
use crate::error::{HarvesterError, Result};
use crate::results::TaskResult;
use crate::services::Service;
use crate::tasks::TaskMaster;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Ordered record of collaborator calls, shared between doubles
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e == entry)
    }
}

/// Task master that only counts calls
pub struct FakeTaskMaster {
    journal: Journal,
    tasks: Vec<String>,
    scheduling: AtomicBool,
    torn_down: AtomicBool,
    begins: AtomicUsize,
    halts: AtomicUsize,
    teardowns: AtomicUsize,
    fail_begin: AtomicBool,
    fail_teardown: AtomicBool,
}

impl FakeTaskMaster {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            tasks: vec!["scrape".to_string()],
            scheduling: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            begins: AtomicUsize::new(0),
            halts: AtomicUsize::new(0),
            teardowns: AtomicUsize::new(0),
            fail_begin: AtomicBool::new(false),
            fail_teardown: AtomicBool::new(false),
        }
    }

    pub fn fail_next_begin(&self) {
        self.fail_begin.store(true, Ordering::SeqCst);
    }

    pub fn fail_teardown(&self) {
        self.fail_teardown.store(true, Ordering::SeqCst);
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn halts(&self) -> usize {
        self.halts.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskMaster for FakeTaskMaster {
    async fn begin_scheduling(&self) -> Result<()> {
        if self.fail_begin.swap(false, Ordering::SeqCst) {
            self.journal.record("tasks:begin-failed");
            return Err(HarvesterError::component("fake_task_master", "begin failed"));
        }
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(HarvesterError::component("fake_task_master", "torn down"));
        }
        if !self.scheduling.swap(true, Ordering::SeqCst) {
            self.begins.fetch_add(1, Ordering::SeqCst);
            self.journal.record("tasks:begin");
        }
        Ok(())
    }

    async fn halt_scheduling(&self) -> Result<()> {
        if self.scheduling.swap(false, Ordering::SeqCst) {
            self.halts.fetch_add(1, Ordering::SeqCst);
            self.journal.record("tasks:halt");
        }
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        self.scheduling.store(false, Ordering::SeqCst);
        self.torn_down.store(true, Ordering::SeqCst);
        self.journal.record("tasks:teardown");
        if self.fail_teardown.load(Ordering::SeqCst) {
            return Err(HarvesterError::component("fake_task_master", "teardown failed"));
        }
        Ok(())
    }

    fn is_scheduling(&self) -> bool {
        self.scheduling.load(Ordering::SeqCst)
    }

    fn task_names(&self) -> Vec<String> {
        self.tasks.clone()
    }
}

/// Data manager recording its lifecycle calls
pub struct RecordingDataManager {
    journal: Journal,
    initialized: AtomicBool,
}

impl RecordingDataManager {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            initialized: AtomicBool::new(false),
        }
    }

    /// Already past `init`
    pub fn ready(journal: Journal) -> Self {
        let manager = Self::new(journal);
        manager.initialized.store(true, Ordering::SeqCst);
        manager
    }
}

#[async_trait]
impl DataManager for RecordingDataManager {
    fn backend(&self) -> &'static str {
        "recording"
    }

    async fn init(&self) -> Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        self.journal.record("data:init");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn persist(&self, _result: TaskResult) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _query: &ResultQuery) -> Result<Vec<TaskResult>> {
        Ok(Vec::new())
    }

    async fn teardown(&self) -> Result<()> {
        self.initialized.store(false, Ordering::SeqCst);
        self.journal.record("data:teardown");
        Ok(())
    }
}

/// Service that runs until its token is cancelled
pub struct RecordingService {
    name: String,
    journal: Journal,
    token: CancellationToken,
    running: AtomicBool,
    starts: AtomicUsize,
    shutdowns: AtomicUsize,
    fail_shutdown: bool,
}

impl RecordingService {
    pub fn new(name: &str, token: CancellationToken) -> Self {
        Self {
            name: name.to_string(),
            journal: Journal::new(),
            token,
            running: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            fail_shutdown: false,
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub async fn wait_until_running(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("service did not start in time");
    }
}

#[async_trait]
impl Service for RecordingService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        self.journal.record(format!("service:{}:start", self.name));

        self.token.cancelled().await;

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        self.journal.record(format!("service:{}:shutdown", self.name));
        if self.fail_shutdown {
            return Err(HarvesterError::component("recording_service", "shutdown failed"));
        }
        Ok(())
    }
}
