//! End-to-end tests for the research task API.
//!
//! These drive the full stack through HTTP: gateway routing, the task
//! manager and its workers, the ReAct loop, real tools and report files.
//! Only the reasoning engine is scripted.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use delve_agent::AgentSettings;
use delve_core::error::ProviderError;
use delve_core::event::EventBus;
use delve_core::message::Message;
use delve_core::provider::{Provider, ProviderRequest, ProviderResponse};
use delve_gateway::{GatewayState, build_router};
use delve_tasks::{AgentExecutor, InMemoryTaskStore, TaskManager, TaskManagerConfig};
use http_body_util::BodyExt;
use tower::ServiceExt;

// ── Scripted engine ──────────────────────────────────────────────────────

/// Uses the calculator once, then answers with what it observed.
///
/// Replies depend only on the prompt, so concurrent tasks sharing one
/// provider stay deterministic.
struct CalculatorThenAnswer;

#[async_trait::async_trait]
impl Provider for CalculatorThenAnswer {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let prompt = &request.messages[0].content;
        let text = match prompt.rfind("Observation: Result: ") {
            Some(idx) => {
                let value = prompt[idx + "Observation: Result: ".len()..]
                    .lines()
                    .next()
                    .unwrap_or_default();
                format!("Thought: I now know the final answer\nFinal Answer: The answer is {value}")
            }
            None => "Thought: I should compute this\nAction: calculator\nAction Input: 2 + 2".to_string(),
        };
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: request.model,
            metadata: serde_json::Map::new(),
        })
    }
}

/// Never produces a usable reply.
struct Rambler;

#[async_trait::async_trait]
impl Provider for Rambler {
    fn name(&self) -> &str {
        "rambler"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant("Let me think about that some more."),
            usage: None,
            model: request.model,
            metadata: serde_json::Map::new(),
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

fn app(provider: Arc<dyn Provider>, dir: &Path) -> Router {
    let settings = AgentSettings {
        reports_dir: dir.join("reports"),
        data_dir: dir.join("data"),
        ..AgentSettings::default()
    };
    let events = Arc::new(EventBus::default());
    let tasks = TaskManager::new(
        Arc::new(InMemoryTaskStore::new()),
        Arc::new(AgentExecutor::new(provider, settings).with_event_bus(Arc::clone(&events))),
        events,
        TaskManagerConfig::default(),
    );
    build_router(Arc::new(GatewayState {
        tasks: Arc::new(tasks),
    }))
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn submit(app: &Router, body: serde_json::Value) -> String {
    let req = Request::builder()
        .method("POST")
        .uri("/research")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = call(app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "queued");
    body["task_id"].as_str().unwrap().to_string()
}

async fn wait_for_terminal(app: &Router, id: &str) -> serde_json::Value {
    for _ in 0..500 {
        let req = Request::builder()
            .uri(format!("/research/{id}/status"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app, req).await;
        assert_eq!(status, StatusCode::OK);
        if matches!(body["status"].as_str(), Some("completed" | "failed" | "cancelled")) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {id} did not finish");
}

async fn fetch_result(app: &Router, id: &str) -> serde_json::Value {
    let req = Request::builder()
        .uri(format!("/research/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(app, req).await;
    assert_eq!(status, StatusCode::OK);
    body
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_submit_poll_and_read_result() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(Arc::new(CalculatorThenAnswer), dir.path());

    let id = submit(&app, serde_json::json!({"query": "What is 2 + 2?"})).await;
    let status = wait_for_terminal(&app, &id).await;
    assert_eq!(status["status"], "completed");
    assert_eq!(status["progress"], 100);

    let result = fetch_result(&app, &id).await;
    assert_eq!(result["result"], "The answer is 4");
    assert!(result.get("error").is_none());
    assert_eq!(result["truncated"], false);
    assert_eq!(result["files_generated"], serde_json::json!([]));
}

#[tokio::test]
async fn e2e_report_is_written_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(Arc::new(CalculatorThenAnswer), dir.path());

    let id = submit(
        &app,
        serde_json::json!({"query": "Sum of two and two", "create_report": true}),
    )
    .await;
    wait_for_terminal(&app, &id).await;

    let result = fetch_result(&app, &id).await;
    let files = result["files_generated"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    let report = std::fs::read_to_string(files[0].as_str().unwrap()).unwrap();
    assert!(report.starts_with("# Sum of two and two\n"));
    assert!(report.contains("The answer is 4"));
}

#[tokio::test]
async fn e2e_iteration_cap_marks_result_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(Arc::new(Rambler), dir.path());

    let id = submit(&app, serde_json::json!({"query": "An endless question", "max_iterations": 2})).await;
    let status = wait_for_terminal(&app, &id).await;
    assert_eq!(status["status"], "completed");

    let result = fetch_result(&app, &id).await;
    assert_eq!(result["truncated"], true);
    assert_eq!(result["result"], "Let me think about that some more.");
}

#[tokio::test]
async fn e2e_concurrent_tasks_all_finish() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(Arc::new(CalculatorThenAnswer), dir.path());

    let mut ids = Vec::new();
    for n in 0..6 {
        ids.push(submit(&app, serde_json::json!({"query": format!("Question number {n}")})).await);
    }
    for id in &ids {
        let status = wait_for_terminal(&app, id).await;
        assert_eq!(status["status"], "completed");
    }

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (_, health) = call(&app, req).await;
    assert_eq!(health["total_tasks"], 6);
    assert_eq!(health["active_tasks"], 0);

    let req = Request::builder().uri("/research").body(Body::empty()).unwrap();
    let (_, list) = call(&app, req).await;
    assert_eq!(list["total_tasks"], 6);
}
