#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use synapse_agent::LlmBackend;
use synapse_core::{AgentName, SynapseResult};
use synapse_gateway::GatewayServer;
use synapse_orchestrator::{
    CallOptions, EventDraft, EventType, LlmAgentInvoker, OrchestratorConfig, SynapseContext,
};
use tokio::net::TcpListener;

struct MockModel;

#[async_trait]
impl LlmBackend for MockModel {
    async fn complete(&self, _system: Option<&str>, _prompt: &str) -> SynapseResult<String> {
        Ok("Step done.".to_string())
    }
}

/// Helper: serve a fresh context on a random port, returning the base URL.
async fn start_test_server(with_triggers: bool) -> (String, Arc<SynapseContext>) {
    let invoker = with_triggers.then(|| {
        Arc::new(LlmAgentInvoker::new(Arc::new(MockModel)))
            as Arc<dyn synapse_orchestrator::AgentInvoker>
    });
    let ctx = SynapseContext::new(OrchestratorConfig::default(), None, invoker);
    let app = GatewayServer::build(ctx.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Small yield to let the server task start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{}", addr.port()), ctx)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (base, _ctx) = start_test_server(false).await;
    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "synapse");
}

#[tokio::test]
async fn test_orchestrator_state_endpoints() {
    let (base, ctx) = start_test_server(false).await;

    for i in 0..3u32 {
        ctx.orchestrator()
            .orchestrate(
                AgentName::Coach,
                "advise",
                move || async move { Ok(i) },
                CallOptions::new(),
            )
            .await
            .unwrap();
    }

    let health: serde_json::Value = reqwest::get(format!("{base}/api/orchestrator/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["coach"]["total_calls"], 3);
    assert_eq!(health["coach"]["status"], "healthy");
    assert_eq!(health["letter"]["total_calls"], 0);

    let logs: Vec<serde_json::Value> =
        reqwest::get(format!("{base}/api/orchestrator/logs?limit=2"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["output_summary"], "2");

    let state: serde_json::Value = reqwest::get(format!("{base}/api/orchestrator/state"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["total_calls"], 3);
    assert_eq!(state["total_corrections"], 0);
}

#[tokio::test]
async fn test_emit_and_inspect_chain() {
    let (base, _ctx) = start_test_server(true).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/events"))
        .json(&serde_json::json!({
            "type": "debate:concluded",
            "source": "debate",
            "summary": "Refinancing wins",
            "chain_id": "chain-http"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    let event: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(event["depth"], 0);
    assert_eq!(event["type"], "debate:concluded");

    // debate -> letter -> call-script
    let mut chain = serde_json::Value::Null;
    for _ in 0..50 {
        chain = client
            .get(format!("{base}/api/chains/chain-http"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if chain["events"].as_array().map_or(0, Vec::len) == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let events = chain["events"].as_array().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[2]["type"], "call-script:ready");
    assert_eq!(events[2]["depth"], 2);
    assert_eq!(chain["total_agents"], 3);

    let recent: Vec<serde_json::Value> = client
        .get(format!("{base}/api/events/recent?limit=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["type"], "call-script:ready");

    let missing = client
        .get(format!("{base}/api/chains/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_reserved_event_type_is_rejected() {
    let (base, _ctx) = start_test_server(false).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/events"))
        .json(&serde_json::json!({
            "type": "chain:complete",
            "source": "coach",
            "summary": "forged"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn test_checklist_crud() {
    let (base, ctx) = start_test_server(false).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/checklist"))
        .json(&serde_json::json!({
            "session_id": "s-42",
            "items": [
                {"id": "scan", "title": "Upload statements", "agent": "documents"},
                {"id": "call", "title": "Call the lender", "agent": "call_script"}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let session: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(session["items"][0]["agent"], "vision");
    assert_eq!(session["items"][1]["agent"], "call-script");
    assert_eq!(session["items"][1]["status"], "pending");

    let patched: serde_json::Value = client
        .patch(format!("{base}/api/checklist/s-42/call"))
        .json(&serde_json::json!({"status": "in_progress", "progress": 30}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(patched["status"], "in_progress");
    assert_eq!(patched["progress"], 30);
    assert!(!patched["started_at"].is_null());

    let missing = client
        .patch(format!("{base}/api/checklist/s-42/nope"))
        .json(&serde_json::json!({"progress": 10}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    // A bus event from the vision agent completes the scan item.
    ctx.emit(
        EventType::VisionExtracted,
        EventDraft::root(AgentName::Vision, "chain-x", "Found 2 loans"),
    )
    .unwrap();

    let session: serde_json::Value = client
        .get(format!("{base}/api/checklist/s-42"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["items"][0]["status"], "completed");
    assert_eq!(session["items"][0]["result"], "Found 2 loans");

    let sessions: Vec<serde_json::Value> = client
        .get(format!("{base}/api/checklist"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);

    let unknown = client
        .get(format!("{base}/api/checklist/none"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);

    let bad = client
        .post(format!("{base}/api/checklist"))
        .json(&serde_json::json!({"session_id": " ", "items": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);
}

#[tokio::test]
async fn test_sse_replays_backlog() {
    let (base, ctx) = start_test_server(false).await;
    ctx.emit(
        EventType::StrategyRanked,
        EventDraft::root(AgentName::Strategy, "chain-sse", "Avalanche first"),
    )
    .unwrap();

    let mut resp = reqwest::get(format!("{base}/api/events")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut body = String::new();
    while !body.contains("Avalanche first") {
        let chunk = tokio::time::timeout(Duration::from_secs(2), resp.chunk())
            .await
            .expect("replay before deadline")
            .unwrap()
            .expect("stream open");
        body.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(body.contains("event: strategy:ranked"));

    // Live events follow the backlog.
    ctx.emit(
        EventType::DebateConcluded,
        EventDraft::root(AgentName::Debate, "chain-sse-2", "Keep the loan"),
    )
    .unwrap();
    while !body.contains("Keep the loan") {
        let chunk = tokio::time::timeout(Duration::from_secs(2), resp.chunk())
            .await
            .expect("live event before deadline")
            .unwrap()
            .expect("stream open");
        body.push_str(&String::from_utf8_lossy(&chunk));
    }
}
