use super::{Executor, ExecutorRegistry, TaskRegistry, TaskSpec};
use crate::error::{HarvesterError, Result};
use crate::results::ResultHandler;
use crate::shutdown::deadline_after;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Owns the registered tasks and drives their schedules
#[async_trait]
pub trait TaskMaster: Send + Sync {
    /// Begin running every registered task on its schedule. Idempotent.
    async fn begin_scheduling(&self) -> Result<()>;

    /// Stop all schedules and wait for in-flight runs. Task definitions are kept.
    async fn halt_scheduling(&self) -> Result<()>;

    /// Halt and release resources. No scheduling is possible afterwards.
    async fn teardown(&self) -> Result<()>;

    fn is_scheduling(&self) -> bool;

    fn task_names(&self) -> Vec<String>;
}

struct ScheduledTask {
    spec: TaskSpec,
    executor: Arc<dyn Executor>,
}

/// One begin/halt cycle of scheduling
struct Generation {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Runs each task on a fixed interval
pub struct IntervalTaskMaster {
    tasks: Vec<Arc<ScheduledTask>>,
    handler: ResultHandler,
    parent_token: CancellationToken,
    generation: Mutex<Option<Generation>>,
    torn_down: AtomicBool,
    runs: Arc<AtomicU64>,
}

impl IntervalTaskMaster {
    /// Resolve every task's executor. Tasks with an unknown executor are skipped.
    pub fn new(
        registry: TaskRegistry,
        executors: &ExecutorRegistry,
        handler: ResultHandler,
        parent_token: CancellationToken,
    ) -> Self {
        let mut tasks = Vec::with_capacity(registry.len());

        for (name, spec) in registry {
            match executors.resolve(&spec.executor) {
                Some(executor) => {
                    debug!("Task '{}' bound to executor '{}'", name, spec.executor);
                    tasks.push(Arc::new(ScheduledTask { spec, executor }));
                }
                None => {
                    warn!(
                        "Task '{}' references unknown executor '{}', skipping",
                        name, spec.executor
                    );
                }
            }
        }

        info!("Task master ready with {} task(s)", tasks.len());

        Self {
            tasks,
            handler,
            parent_token,
            generation: Mutex::new(None),
            torn_down: AtomicBool::new(false),
            runs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total executions across all scheduling cycles
    pub fn total_runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Number of schedule loops of the current cycle that are still running
    pub fn active_loops(&self) -> usize {
        self.generation.lock().as_ref().map_or(0, |generation| {
            generation
                .handles
                .iter()
                .filter(|handle| !handle.is_finished())
                .count()
        })
    }

    async fn run_schedule(
        task: Arc<ScheduledTask>,
        handler: ResultHandler,
        token: CancellationToken,
        runs: Arc<AtomicU64>,
    ) {
        let period = task.spec.interval();
        let first = if task.spec.run_immediately {
            Instant::now()
        } else {
            deadline_after(period)
        };
        let mut ticker = interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let started_at = Utc::now();
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Task '{}' cancelled mid-run", task.spec.name);
                    break;
                }
                outcome = task.executor.execute(&task.spec) => outcome,
            };

            runs.fetch_add(1, Ordering::SeqCst);
            handler.handle(&task.spec, outcome, started_at).await;
        }

        debug!("Schedule for task '{}' stopped", task.spec.name);
    }
}

#[async_trait]
impl TaskMaster for IntervalTaskMaster {
    async fn begin_scheduling(&self) -> Result<()> {
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(HarvesterError::component(
                "task_master",
                "Cannot schedule after teardown",
            ));
        }

        let mut generation = self.generation.lock();
        if generation.is_some() {
            debug!("Scheduling already active");
            return Ok(());
        }

        let token = self.parent_token.child_token();
        let handles = self
            .tasks
            .iter()
            .map(|task| {
                tokio::spawn(Self::run_schedule(
                    Arc::clone(task),
                    self.handler.clone(),
                    token.clone(),
                    Arc::clone(&self.runs),
                ))
            })
            .collect::<Vec<_>>();

        info!("Scheduling {} task(s)", handles.len());
        *generation = Some(Generation { token, handles });
        Ok(())
    }

    async fn halt_scheduling(&self) -> Result<()> {
        let current = self.generation.lock().take();
        let Some(generation) = current else {
            debug!("Scheduling not active");
            return Ok(());
        };

        generation.token.cancel();
        let count = generation.handles.len();

        for handle in generation.handles {
            if let Err(e) = handle.await {
                error!("Schedule loop ended abnormally: {}", e);
            }
        }

        info!("Halted {} schedule loop(s)", count);
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        self.halt_scheduling().await?;
        self.torn_down.store(true, Ordering::SeqCst);
        info!("Task master torn down");
        Ok(())
    }

    fn is_scheduling(&self) -> bool {
        self.generation.lock().is_some()
    }

    fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.spec.name.clone()).collect()
    }
}
