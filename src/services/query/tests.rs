use super::server::{router, ServerState};
use super::QueryServiceBuilder;
use crate::command::{command_queue, Command, CommandReceiver};
use crate::config::QueryConfig;
use crate::data::{DataManager, MemoryDataManager};
use crate::results::TaskResult;
use crate::services::Service;
use crate::tasks::TaskSpec;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

async fn app(capacity: usize) -> (Router, Arc<MemoryDataManager>, CommandReceiver) {
    let store = Arc::new(MemoryDataManager::new());
    store.init().await.unwrap();

    let scrape = TaskSpec::new("scrape", "echo", 60);
    let ping = TaskSpec::new("ping", "heartbeat", 60);
    for spec in [&scrape, &ping, &scrape] {
        store
            .persist(TaskResult::succeeded(spec, json!({"ok": true}), Utc::now()))
            .await
            .unwrap();
    }

    let (commands, receiver) = command_queue(capacity);
    let state = ServerState {
        data_manager: store.clone(),
        commands,
    };
    (router(state), store, receiver)
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_reports_backend() {
    let (app, _store, _receiver) = app(4).await;
    let (status, body) = send(app, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["accepting_commands"], true);
}

#[tokio::test]
async fn test_health_unavailable_after_teardown() {
    let (app, store, _receiver) = app(4).await;
    store.teardown().await.unwrap();

    let (status, body) = send(app, "GET", "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn test_results_filtered_by_task() {
    let (app, _store, _receiver) = app(4).await;

    let (status, body) = send(app.clone(), "GET", "/results").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, body) = send(app, "GET", "/results?task=scrape&limit=1").await;
    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["task"], "scrape");
}

#[tokio::test]
async fn test_command_is_queued() {
    let (app, _store, mut receiver) = app(4).await;

    let (status, body) = send(app, "POST", "/commands/reload").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["queued"], "RELOAD");
    assert_eq!(receiver.next().await, Some(Command::Reload));
}

#[tokio::test]
async fn test_unknown_command_rejected() {
    let (app, _store, _receiver) = app(4).await;

    let (status, body) = send(app, "POST", "/commands/restart").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("restart"));
}

#[tokio::test]
async fn test_command_rejected_when_queue_closed() {
    let (app, _store, mut receiver) = app(4).await;
    receiver.close();

    let (status, _body) = send(app, "POST", "/commands/start").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_service_stops_on_shutdown() {
    let store = Arc::new(MemoryDataManager::new());
    store.init().await.unwrap();
    let (commands, _receiver) = command_queue(4);

    let service = Arc::new(
        QueryServiceBuilder::new()
            .config(QueryConfig {
                enabled: true,
                ip: "127.0.0.1".to_string(),
                port: 0,
            })
            .data_manager(store)
            .commands(commands)
            .token(CancellationToken::new())
            .build()
            .unwrap(),
    );

    let running = Arc::clone(&service);
    let handle = tokio::spawn(async move { running.start().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    service.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[test]
fn test_builder_requires_dependencies() {
    assert!(QueryServiceBuilder::new().build().is_err());
}
