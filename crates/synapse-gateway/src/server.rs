use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, patch},
    Json, Router,
};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use synapse_core::AgentName;
use synapse_orchestrator::{
    BusEvent, ChecklistPatch, EventBus, EventDraft, EventType, NewChecklistItem, SynapseContext,
};
use tracing::{debug, info, warn};

const DEFAULT_LOG_LIMIT: usize = 20;

/// The gateway router factory.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the router over a shared context.
    pub fn build(ctx: Arc<SynapseContext>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/api/orchestrator/health", get(agent_health_handler))
            .route("/api/orchestrator/logs", get(logs_handler))
            .route("/api/orchestrator/state", get(state_handler))
            .route("/api/events", get(events_sse_handler).post(emit_handler))
            .route("/api/events/recent", get(recent_events_handler))
            .route("/api/chains/{chain_id}", get(chain_handler))
            .route(
                "/api/checklist",
                get(list_checklists_handler).post(create_checklist_handler),
            )
            .route("/api/checklist/{session_id}", get(get_checklist_handler))
            .route(
                "/api/checklist/{session_id}/{item_id}",
                patch(update_checklist_item_handler),
            )
            .with_state(ctx)
    }
}

type AppState = State<Arc<SynapseContext>>;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "synapse"}))
}

async fn agent_health_handler(State(ctx): AppState) -> impl IntoResponse {
    Json(ctx.agent_health_map())
}

async fn logs_handler(State(ctx): AppState, Query(q): Query<LimitQuery>) -> impl IntoResponse {
    Json(ctx.recent_logs(q.limit.unwrap_or(DEFAULT_LOG_LIMIT)))
}

async fn state_handler(State(ctx): AppState) -> impl IntoResponse {
    Json(ctx.state())
}

async fn recent_events_handler(
    State(ctx): AppState,
    Query(q): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = q.limit.unwrap_or(ctx.config().replay_events);
    Json(ctx.bus().recent_events(limit))
}

async fn chain_handler(State(ctx): AppState, Path(chain_id): Path<String>) -> Response {
    match ctx.chain(&chain_id) {
        Some(chain) => Json(chain).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("unknown chain '{chain_id}'")),
    }
}

fn sse_event(event: &BusEvent) -> Event {
    Event::default()
        .event(event.event_type.as_str())
        .id(event.id.to_string())
        .json_data(event)
        .unwrap_or_else(|_| Event::default().comment("unserializable event"))
}

/// `GET /api/events`: replay recent events, then stream live ones.
///
/// The live subscription is taken before the replay snapshot, so nothing
/// emitted in between is lost; duplicates are filtered by id.
async fn events_sse_handler(
    State(ctx): AppState,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (subscription, rx) = ctx.bus().subscribe_channel();
    let replay = ctx.replay();
    let replayed: HashSet<_> = replay.iter().map(|e| e.id).collect();
    debug!(
        subscriber = subscription.id(),
        replayed = replay.len(),
        "SSE client connected"
    );

    let backlog = stream::iter(replay.into_iter().map(|e| Ok(sse_event(&e))));
    let live = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
    .filter(move |event| std::future::ready(!replayed.contains(&event.id)))
    .map(|event| Ok(sse_event(&event)));

    Sse::new(backlog.chain(live)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

#[derive(Debug, Deserialize)]
struct EmitRequest {
    #[serde(rename = "type")]
    event_type: EventType,
    source: AgentName,
    summary: String,
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(default)]
    chain_id: Option<String>,
    #[serde(default)]
    duration_ms: Option<u64>,
}

/// `POST /api/events`: emit a user-initiated root event.
async fn emit_handler(State(ctx): AppState, Json(req): Json<EmitRequest>) -> Response {
    let chain_id = req.chain_id.unwrap_or_else(EventBus::new_chain_id);
    let mut draft = EventDraft::root(req.source, chain_id, req.summary).payload(req.payload);
    if let Some(ms) = req.duration_ms {
        draft = draft.duration_ms(ms);
    }
    match ctx.emit(req.event_type, draft) {
        Some(event) => {
            info!(event_type = %event.event_type, chain_id = %event.chain_id, "Root event emitted");
            (StatusCode::ACCEPTED, Json(event)).into_response()
        }
        None => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("event type '{}' cannot be emitted", req.event_type),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct CreateChecklistRequest {
    session_id: String,
    items: Vec<NewChecklistItem>,
}

async fn create_checklist_handler(
    State(ctx): AppState,
    Json(req): Json<CreateChecklistRequest>,
) -> Response {
    match ctx.checklists().create_checklist(&req.session_id, req.items) {
        Ok(session) => (StatusCode::CREATED, Json(session)).into_response(),
        Err(e) => {
            warn!(session_id = %req.session_id, error = %e, "Checklist rejected");
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn list_checklists_handler(State(ctx): AppState) -> impl IntoResponse {
    Json(ctx.checklist_sessions())
}

async fn get_checklist_handler(State(ctx): AppState, Path(session_id): Path<String>) -> Response {
    match ctx.checklist(&session_id) {
        Some(session) => Json(session).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("no checklist for session '{session_id}'"),
        ),
    }
}

async fn update_checklist_item_handler(
    State(ctx): AppState,
    Path((session_id, item_id)): Path<(String, String)>,
    Json(patch): Json<ChecklistPatch>,
) -> Response {
    match ctx.update_checklist_item(&session_id, &item_id, patch) {
        Some(item) => Json(item).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("no item '{item_id}' in session '{session_id}'"),
        ),
    }
}
