//! Tracking and cooperative cancellation of background work.
//!
//! Every long-running unit of work that is not the control loop itself is spawned
//! through a [`ShutdownCoordinator`]. During process shutdown the coordinator
//! cancels its root token, then waits for each unit up to a shared deadline.
//! Units still running at the deadline are aborted. Failures and panics are
//! logged and counted, never propagated.

use crate::error::{HarvesterError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::{AbortHandle, Id, JoinSet};
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fallback horizon for durations too large to add to the current instant
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + after`, saturating at a far-future instant instead of overflowing
pub(crate) fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Outcome of a coordinated shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Units that finished cleanly after cancellation was requested
    pub completed: usize,
    /// Units that returned an error or panicked
    pub failed: usize,
    /// Units that ignored cancellation and were aborted at the deadline
    pub aborted: usize,
}

impl ShutdownReport {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.aborted
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.aborted == 0
    }
}

struct TrackedWork {
    name: String,
    handle: AbortHandle,
}

/// Spawned work plus the names it was registered under. `None` once closed.
#[derive(Default)]
struct Tracker {
    set: JoinSet<Result<()>>,
    names: HashMap<Id, TrackedWork>,
}

pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracker: Mutex<Option<Tracker>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: Mutex::new(Some(Tracker::default())),
        }
    }

    /// Token cancelled when shutdown begins. Work units should hold a child.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a tracked unit of work
    pub fn spawn<F>(&self, name: impl Into<String>, work: F) -> Result<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let mut guard = self.tracker.lock();
        let Some(tracker) = guard.as_mut() else {
            return Err(HarvesterError::system(format!(
                "Cannot spawn '{}': shutdown in progress",
                name
            )));
        };

        debug!("Spawning tracked work '{}'", name);
        let handle = tracker.set.spawn(work);
        tracker.names.insert(handle.id(), TrackedWork { name, handle });
        Ok(())
    }

    /// Number of tracked units that have not finished yet
    pub fn outstanding(&self) -> usize {
        self.tracker.lock().as_ref().map_or(0, |tracker| {
            tracker
                .names
                .values()
                .filter(|work| !work.handle.is_finished())
                .count()
        })
    }

    /// Cancel all tracked work and wait for it, bounded by `grace`
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        // Later spawns are rejected from here on
        let taken = self.tracker.lock().take();
        self.token.cancel();

        let mut report = ShutdownReport::default();
        let Some(Tracker { mut set, mut names }) = taken else {
            debug!("Coordinator already shut down");
            return report;
        };

        info!(
            "Cancelling {} outstanding work unit(s), grace period {:?}",
            set.len(),
            grace
        );

        let deadline = deadline_after(grace);
        let name_of = |names: &mut HashMap<Id, TrackedWork>, id: Id| {
            names
                .remove(&id)
                .map_or_else(|| format!("task {}", id), |work| work.name)
        };

        loop {
            match timeout_at(deadline, set.join_next_with_id()).await {
                Ok(None) => break,
                Ok(Some(Ok((id, Ok(()))))) => {
                    debug!("Work '{}' finished", name_of(&mut names, id));
                    report.completed += 1;
                }
                Ok(Some(Ok((id, Err(e))))) => {
                    warn!("Work '{}' finished with error: {}", name_of(&mut names, id), e);
                    report.failed += 1;
                }
                Ok(Some(Err(join_error))) if join_error.is_cancelled() => {
                    debug!("Work '{}' was cancelled", name_of(&mut names, join_error.id()));
                    report.completed += 1;
                }
                Ok(Some(Err(join_error))) => {
                    error!(
                        "Work '{}' panicked: {}",
                        name_of(&mut names, join_error.id()),
                        join_error
                    );
                    report.failed += 1;
                }
                Err(_) => {
                    for work in names.values() {
                        warn!(
                            "Work '{}' did not stop within grace period, aborting",
                            work.name
                        );
                    }
                    report.aborted += set.len();
                    set.abort_all();
                    break;
                }
            }
        }

        info!(
            "Coordinated shutdown finished: {} completed, {} failed, {} aborted",
            report.completed, report.failed, report.aborted
        );
        report
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
