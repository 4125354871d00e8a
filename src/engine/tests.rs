use super::*;
use crate::error::HarvesterError;
use crate::shutdown::ShutdownCoordinator;
use crate::tasks::TaskMaster;
use crate::testing::{FakeTaskMaster, Journal, RecordingDataManager, RecordingService};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    engine: Engine,
    journal: Journal,
    tasks: Arc<FakeTaskMaster>,
    service: Arc<RecordingService>,
}

fn harness() -> Harness {
    let journal = Journal::new();
    let coordinator = Arc::new(ShutdownCoordinator::new());
    let tasks = Arc::new(FakeTaskMaster::new(journal.clone()));
    let data = Arc::new(RecordingDataManager::ready(journal.clone()));
    let service = Arc::new(
        RecordingService::new("query", coordinator.child_token()).with_journal(journal.clone()),
    );

    let engine = Engine::builder()
        .with_task_master(tasks.clone())
        .with_data_manager(data)
        .with_service(service.clone())
        .with_coordinator(coordinator)
        .with_shutdown_grace(Duration::from_secs(1))
        .build()
        .unwrap();

    Harness {
        engine,
        journal,
        tasks,
        service,
    }
}

#[test]
fn test_build_requires_collaborators() {
    let result = Engine::builder().build();
    assert!(matches!(result, Err(HarvesterError::Component { .. })));

    let journal = Journal::new();
    let result = Engine::builder()
        .with_task_master(Arc::new(FakeTaskMaster::new(journal)))
        .build();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_new_engine_is_stopped() {
    let h = harness();
    assert_eq!(h.engine.state(), EngineState::Stopped);
    assert_eq!(h.engine.transitions(), &[EngineState::Stopped]);
    assert!(h.engine.last_shutdown_report().is_none());
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let mut h = harness();

    h.engine.start().await.unwrap();
    h.engine.start().await.unwrap();

    assert!(h.engine.is_running());
    assert_eq!(h.tasks.begins(), 1);
    assert_eq!(
        h.engine.transitions(),
        &[
            EngineState::Stopped,
            EngineState::Starting,
            EngineState::Running
        ]
    );
}

#[tokio::test]
async fn test_stop_halts_scheduling() {
    let mut h = harness();

    h.engine.start().await.unwrap();
    h.engine.stop().await.unwrap();

    assert_eq!(h.engine.state(), EngineState::Stopped);
    assert_eq!(h.tasks.halts(), 1);
    assert!(!h.tasks.is_scheduling());

    // Stopping again changes nothing
    h.engine.stop().await.unwrap();
    assert_eq!(h.tasks.halts(), 1);
}

#[tokio::test]
async fn test_failed_start_returns_to_stopped() {
    let mut h = harness();
    h.tasks.fail_next_begin();

    assert!(h.engine.start().await.is_err());
    assert_eq!(h.engine.state(), EngineState::Stopped);

    // The next attempt succeeds
    h.engine.start().await.unwrap();
    assert!(h.engine.is_running());
}

#[tokio::test]
async fn test_start_refused_without_initialized_storage() {
    let journal = Journal::new();
    let tasks = Arc::new(FakeTaskMaster::new(journal.clone()));
    let mut engine = Engine::builder()
        .with_task_master(tasks.clone())
        .with_data_manager(Arc::new(RecordingDataManager::new(journal)))
        .build()
        .unwrap();

    let result = engine.start().await;
    assert!(matches!(result, Err(HarvesterError::NotInitialized { .. })));
    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(tasks.begins(), 0);
}

#[tokio::test]
async fn test_reload_matches_stop_then_start() {
    let mut reloaded = harness();
    reloaded.engine.start().await.unwrap();
    reloaded.engine.reload().await.unwrap();

    let mut manual = harness();
    manual.engine.start().await.unwrap();
    manual.engine.stop().await.unwrap();
    manual.engine.start().await.unwrap();

    assert_eq!(reloaded.engine.state(), manual.engine.state());
    assert_eq!(reloaded.engine.transitions(), manual.engine.transitions());
    assert_eq!(reloaded.journal.entries(), manual.journal.entries());

    // One live schedule, not two
    assert_eq!(reloaded.tasks.begins(), 2);
    assert_eq!(reloaded.tasks.halts(), 1);
    assert!(reloaded.tasks.is_scheduling());
}

#[tokio::test]
async fn test_reload_from_stopped_starts() {
    let mut h = harness();
    h.engine.reload().await.unwrap();

    assert!(h.engine.is_running());
    assert_eq!(h.tasks.begins(), 1);
    assert_eq!(h.tasks.halts(), 0);
}

#[tokio::test]
async fn test_stop_and_reload_leave_services_alone() {
    let mut h = harness();
    h.engine.launch_services().unwrap();
    h.service.wait_until_running().await;

    h.engine.start().await.unwrap();
    h.engine.stop().await.unwrap();
    h.engine.start().await.unwrap();
    h.engine.reload().await.unwrap();

    assert!(h.service.is_running());
    assert_eq!(h.service.starts(), 1);
    assert_eq!(h.service.shutdowns(), 0);

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_from_running() {
    let mut h = harness();
    h.engine.launch_services().unwrap();
    h.service.wait_until_running().await;
    h.engine.start().await.unwrap();

    h.engine.shutdown().await.unwrap();

    assert!(h.engine.is_terminated());
    assert_eq!(h.tasks.halts(), 1);
    assert_eq!(h.tasks.teardowns(), 1);
    assert_eq!(h.service.shutdowns(), 1);
    assert!(!h.service.is_running());
    assert_eq!(h.engine.coordinator().outstanding(), 0);

    let report = h.engine.last_shutdown_report().unwrap();
    assert!(report.is_clean());
    assert_eq!(report.completed, 1);

    // Scheduling stops before storage goes away
    let halt = h.journal.position("tasks:halt").unwrap();
    let teardown = h.journal.position("tasks:teardown").unwrap();
    let data = h.journal.position("data:teardown").unwrap();
    assert!(halt < teardown);
    assert!(teardown < data);
}

#[tokio::test]
async fn test_shutdown_from_stopped() {
    let mut h = harness();

    h.engine.shutdown().await.unwrap();

    assert!(h.engine.is_terminated());
    assert_eq!(h.tasks.halts(), 0);
    assert_eq!(h.tasks.teardowns(), 1);
    assert_eq!(h.journal.count("data:teardown"), 1);
    assert_eq!(
        h.engine.transitions(),
        &[
            EngineState::Stopped,
            EngineState::Stopping,
            EngineState::Terminated
        ]
    );
}

#[tokio::test]
async fn test_terminated_is_absorbing() {
    let mut h = harness();
    h.engine.shutdown().await.unwrap();

    assert!(matches!(h.engine.start().await, Err(HarvesterError::Terminated)));
    assert!(matches!(h.engine.stop().await, Err(HarvesterError::Terminated)));
    assert!(matches!(h.engine.reload().await, Err(HarvesterError::Terminated)));
    assert!(h.engine.launch_services().is_err());

    // Second shutdown is a no-op
    h.engine.shutdown().await.unwrap();
    assert_eq!(h.tasks.teardowns(), 1);
    assert_eq!(h.engine.state(), EngineState::Terminated);
}

#[tokio::test]
async fn test_shutdown_failures_still_terminate() {
    let mut h = harness();
    h.tasks.fail_teardown();
    h.engine.start().await.unwrap();

    let result = h.engine.shutdown().await;

    assert!(result.is_err());
    assert!(h.engine.is_terminated());
    // Later steps still ran
    assert_eq!(h.journal.count("data:teardown"), 1);
    assert_eq!(h.service.shutdowns(), 1);
}
