//! In-process publish/subscribe bus for agent completion events.
//!
//! Every event belongs to a chain and carries a hop depth. Live subscribers
//! receive each accepted event synchronously, in registration order, at the
//! moment of emission. Handlers registered per [`EventType`] run afterwards as
//! spawned tasks and may emit follow-up events one hop deeper. The bus refuses
//! anything deeper than [`MAX_HOP_DEPTH`], which bounds every chain no matter
//! how the handler table loops.

use crate::config::OrchestratorConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use synapse_core::{AgentName, SynapseError, SynapseResult};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Deepest hop the bus will accept. Depth 0 is a user-initiated event.
pub const MAX_HOP_DEPTH: i32 = 3;

/// Depth carried by synthesized chain summary events.
pub const SUMMARY_DEPTH: i32 = -1;

/// The closed set of event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "vision:extracted")]
    VisionExtracted,
    #[serde(rename = "watchdog:matched")]
    WatchdogMatched,
    #[serde(rename = "freedom:updated")]
    FreedomUpdated,
    #[serde(rename = "coach:advised")]
    CoachAdvised,
    #[serde(rename = "debate:concluded")]
    DebateConcluded,
    #[serde(rename = "letter:drafted")]
    LetterDrafted,
    #[serde(rename = "call-script:ready")]
    CallScriptReady,
    #[serde(rename = "strategy:ranked")]
    StrategyRanked,
    /// Synthesized by [`EventBus::complete_chain`]; never dispatched to handlers.
    #[serde(rename = "chain:complete")]
    ChainComplete,
}

impl EventType {
    /// Every event type.
    pub const ALL: [EventType; 9] = [
        EventType::VisionExtracted,
        EventType::WatchdogMatched,
        EventType::FreedomUpdated,
        EventType::CoachAdvised,
        EventType::DebateConcluded,
        EventType::LetterDrafted,
        EventType::CallScriptReady,
        EventType::StrategyRanked,
        EventType::ChainComplete,
    ];

    /// Wire name, `source:verb`.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::VisionExtracted => "vision:extracted",
            EventType::WatchdogMatched => "watchdog:matched",
            EventType::FreedomUpdated => "freedom:updated",
            EventType::CoachAdvised => "coach:advised",
            EventType::DebateConcluded => "debate:concluded",
            EventType::LetterDrafted => "letter:drafted",
            EventType::CallScriptReady => "call-script:ready",
            EventType::StrategyRanked => "strategy:ranked",
            EventType::ChainComplete => "chain:complete",
        }
    }

    /// The agent that conventionally emits this event type.
    pub fn emitter(self) -> Option<AgentName> {
        match self {
            EventType::VisionExtracted => Some(AgentName::Vision),
            EventType::WatchdogMatched => Some(AgentName::Watchdog),
            EventType::FreedomUpdated => Some(AgentName::Freedom),
            EventType::CoachAdvised => Some(AgentName::Coach),
            EventType::DebateConcluded => Some(AgentName::Debate),
            EventType::LetterDrafted => Some(AgentName::Letter),
            EventType::CallScriptReady => Some(AgentName::CallScript),
            EventType::StrategyRanked => Some(AgentName::Strategy),
            EventType::ChainComplete => None,
        }
    }

    /// Whether the event reports an agent finishing work.
    pub fn is_agent_completion(self) -> bool {
        self.emitter().is_some()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = SynapseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SynapseError::Bus(format!("Unknown event type: {s}")))
    }
}

/// An immutable event on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub source: AgentName,
    pub chain_id: String,
    /// Hops since the chain's originating event; [`SUMMARY_DEPTH`] for summaries.
    pub depth: i32,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub duration_ms: Option<u64>,
    pub triggered_by: Option<Uuid>,
}

/// The caller-supplied part of an event; the bus assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub source: AgentName,
    pub chain_id: String,
    pub depth: i32,
    pub summary: String,
    pub payload: serde_json::Value,
    pub duration_ms: Option<u64>,
    pub triggered_by: Option<Uuid>,
}

impl EventDraft {
    /// A depth-0 event starting (or joining) `chain_id`.
    pub fn root(source: AgentName, chain_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            source,
            chain_id: chain_id.into(),
            depth: 0,
            summary: summary.into(),
            payload: serde_json::Value::Null,
            duration_ms: None,
            triggered_by: None,
        }
    }

    /// The next hop after `cause`: same chain, one level deeper.
    pub fn follow_up(cause: &BusEvent, source: AgentName, summary: impl Into<String>) -> Self {
        Self {
            source,
            chain_id: cause.chain_id.clone(),
            depth: cause.depth + 1,
            summary: summary.into(),
            payload: serde_json::Value::Null,
            duration_ms: None,
            triggered_by: Some(cause.id),
        }
    }

    pub fn depth(mut self, depth: i32) -> Self {
        self.depth = depth;
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn triggered_by(mut self, id: Uuid) -> Self {
        self.triggered_by = Some(id);
        self
    }
}

/// Lifecycle of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainStatus {
    Running,
    Completed,
    Error,
}

/// Aggregate view of one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSummary {
    pub chain_id: String,
    /// Accepted events in emission order.
    pub events: Vec<BusEvent>,
    /// Distinct source agents among `events`.
    pub total_agents: usize,
    pub total_duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ChainStatus,
    pub error: Option<String>,
}

impl ChainSummary {
    fn new(chain_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            events: Vec::new(),
            total_agents: 0,
            total_duration_ms: 0,
            started_at,
            completed_at: None,
            status: ChainStatus::Running,
            error: None,
        }
    }

    fn absorb(&mut self, event: &BusEvent) {
        self.events.push(event.clone());
        self.total_agents = self
            .events
            .iter()
            .map(|e| e.source)
            .collect::<BTreeSet<_>>()
            .len();
        self.total_duration_ms += event.duration_ms.unwrap_or(0);
    }

    /// Distinct agents in first-seen order.
    pub fn agents(&self) -> Vec<AgentName> {
        let mut seen = Vec::new();
        for event in &self.events {
            if !seen.contains(&event.source) {
                seen.push(event.source);
            }
        }
        seen
    }
}

/// Async reaction to events of one type.
///
/// Errors are logged by the bus and never reach the emitter.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// React to `event`. `bus` is the bus that dispatched it.
    async fn handle(&self, bus: Arc<EventBus>, event: BusEvent) -> SynapseResult<()>;
}

/// Live subscriber callback. Returning an error marks it disconnected.
pub type SubscriberFn = Arc<dyn Fn(&BusEvent) -> SynapseResult<()> + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    bus: Weak<EventBus>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop receiving events. Returns false if already unsubscribed.
    pub fn unsubscribe(&self) -> bool {
        self.bus
            .upgrade()
            .is_some_and(|bus| bus.unsubscribe(self.id))
    }
}

#[derive(Debug)]
struct BusState {
    log: VecDeque<BusEvent>,
    chains: HashMap<String, ChainSummary>,
}

/// The event bus.
pub struct EventBus {
    max_event_log: usize,
    max_chains: usize,
    state: Mutex<BusState>,
    subscribers: Mutex<Vec<(u64, SubscriberFn)>>,
    next_subscriber_id: AtomicU64,
    handlers: RwLock<HashMap<EventType, Vec<Arc<dyn EventHandler>>>>,
}

impl EventBus {
    pub fn new(config: &OrchestratorConfig) -> Arc<Self> {
        Arc::new(Self {
            max_event_log: config.max_event_log.max(1),
            max_chains: config.max_chains.max(1),
            state: Mutex::new(BusState {
                log: VecDeque::new(),
                chains: HashMap::new(),
            }),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(1),
            handlers: RwLock::new(HashMap::new()),
        })
    }

    /// A fresh chain identifier for a user-initiated root event.
    pub fn new_chain_id() -> String {
        format!("chain-{}", Uuid::new_v4().simple())
    }

    /// Register a handler for one event type.
    pub fn register_handler(&self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    /// Number of handlers registered for `event_type`.
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers.read().get(&event_type).map_or(0, Vec::len)
    }

    /// Emit an event.
    ///
    /// Returns `None` without recording or dispatching anything when the
    /// draft's depth is outside `0..=MAX_HOP_DEPTH` or the type is the
    /// reserved summary type. Otherwise the event is logged, folded into its
    /// chain, delivered to live subscribers, and handed to registered
    /// handlers as spawned tasks.
    pub fn emit(self: &Arc<Self>, event_type: EventType, draft: EventDraft) -> Option<BusEvent> {
        if event_type == EventType::ChainComplete {
            warn!(chain_id = %draft.chain_id, "chain:complete is reserved for complete_chain, dropping");
            return None;
        }
        if draft.depth > MAX_HOP_DEPTH || draft.depth < 0 {
            warn!(
                event_type = %event_type,
                chain_id = %draft.chain_id,
                depth = draft.depth,
                max_depth = MAX_HOP_DEPTH,
                "Hop depth out of range, event rejected"
            );
            return None;
        }

        let event = BusEvent {
            id: Uuid::new_v4(),
            event_type,
            source: draft.source,
            chain_id: draft.chain_id,
            depth: draft.depth,
            timestamp: Utc::now(),
            summary: draft.summary,
            payload: draft.payload,
            duration_ms: draft.duration_ms,
            triggered_by: draft.triggered_by,
        };

        {
            let mut state = self.state.lock();
            self.append_log(&mut state, event.clone());

            if !state.chains.contains_key(&event.chain_id) {
                self.evict_chains(&mut state);
                state.chains.insert(
                    event.chain_id.clone(),
                    ChainSummary::new(&event.chain_id, event.timestamp),
                );
            }
            if let Some(chain) = state.chains.get_mut(&event.chain_id) {
                chain.absorb(&event);
            }
        }

        debug!(
            event_type = %event.event_type,
            source = %event.source,
            chain_id = %event.chain_id,
            depth = event.depth,
            "Event emitted"
        );

        self.deliver(&event);
        self.dispatch(&event);

        Some(event)
    }

    /// Mark a chain completed and announce a summary event to live subscribers.
    ///
    /// The summary is not folded into the chain and never reaches handlers.
    /// Returns `None` for unknown or already-completed chains, so repeated
    /// calls deliver at most one summary.
    pub fn complete_chain(&self, chain_id: &str) -> Option<BusEvent> {
        let summary_event = {
            let mut state = self.state.lock();
            let chain = state.chains.get_mut(chain_id)?;
            if chain.status == ChainStatus::Completed {
                debug!(chain_id = %chain_id, "Chain already completed");
                return None;
            }

            let now = Utc::now();
            chain.status = ChainStatus::Completed;
            chain.completed_at = Some(now);

            let last = chain.events.last()?;
            let agents: Vec<String> = chain.agents().iter().map(ToString::to_string).collect();
            let event = BusEvent {
                id: Uuid::new_v4(),
                event_type: EventType::ChainComplete,
                source: last.source,
                chain_id: chain_id.to_string(),
                depth: SUMMARY_DEPTH,
                timestamp: now,
                summary: format!(
                    "Chain complete: {} events across {} agents in {}ms",
                    chain.events.len(),
                    chain.total_agents,
                    chain.total_duration_ms
                ),
                payload: serde_json::json!({
                    "chain_id": chain_id,
                    "total_events": chain.events.len(),
                    "total_agents": chain.total_agents,
                    "agents": agents,
                    "total_duration_ms": chain.total_duration_ms,
                    "started_at": chain.started_at,
                    "completed_at": now,
                }),
                duration_ms: Some(chain.total_duration_ms),
                triggered_by: Some(last.id),
            };
            self.append_log(&mut state, event.clone());
            event
        };

        info!(chain_id = %chain_id, summary = %summary_event.summary, "Chain completed");
        self.deliver(&summary_event);
        Some(summary_event)
    }

    /// Mark a chain as failed. Returns false for unknown chains.
    pub fn fail_chain(&self, chain_id: &str, reason: &str) -> bool {
        let mut state = self.state.lock();
        match state.chains.get_mut(chain_id) {
            Some(chain) => {
                chain.status = ChainStatus::Error;
                chain.error = Some(reason.to_string());
                true
            }
            None => false,
        }
    }

    /// Register a live subscriber for every event emitted from now on.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&BusEvent) -> SynapseResult<()> + Send + Sync + 'static,
    {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, Arc::new(callback)));
        debug!(subscriber = id, "Subscriber registered");
        Subscription {
            id,
            bus: Arc::downgrade(self),
        }
    }

    /// Subscribe through an unbounded channel. The subscription is dropped
    /// on the first delivery after the receiver is closed.
    pub fn subscribe_channel(self: &Arc<Self>) -> (Subscription, mpsc::UnboundedReceiver<BusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| {
            tx.send(event.clone())
                .map_err(|_| SynapseError::Bus("subscriber channel closed".into()))
        });
        (subscription, rx)
    }

    /// Remove a subscriber by id.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Up to `limit` most recent events, oldest first.
    pub fn recent_events(&self, limit: usize) -> Vec<BusEvent> {
        let state = self.state.lock();
        let skip = state.log.len().saturating_sub(limit);
        state.log.iter().skip(skip).cloned().collect()
    }

    pub fn chain(&self, chain_id: &str) -> Option<ChainSummary> {
        self.state.lock().chains.get(chain_id).cloned()
    }

    /// All retained chains, most recently started first.
    pub fn chains(&self) -> Vec<ChainSummary> {
        let mut chains: Vec<ChainSummary> = self.state.lock().chains.values().cloned().collect();
        chains.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        chains
    }

    fn append_log(&self, state: &mut BusState, event: BusEvent) {
        if state.log.len() >= self.max_event_log {
            state.log.pop_front();
        }
        state.log.push_back(event);
    }

    fn evict_chains(&self, state: &mut BusState) {
        while state.chains.len() >= self.max_chains {
            let oldest = state
                .chains
                .values()
                .min_by_key(|c| c.started_at)
                .map(|c| c.chain_id.clone());
            match oldest {
                Some(id) => {
                    state.chains.remove(&id);
                }
                None => break,
            }
        }
    }

    /// Synchronous fan-out in registration order. Failing subscribers are removed.
    fn deliver(&self, event: &BusEvent) {
        let snapshot: Vec<(u64, SubscriberFn)> = self.subscribers.lock().clone();
        let mut disconnected = Vec::new();
        for (id, callback) in &snapshot {
            if let Err(e) = callback(event) {
                debug!(subscriber = id, error = %e, "Subscriber disconnected");
                disconnected.push(*id);
            }
        }
        if !disconnected.is_empty() {
            self.subscribers
                .lock()
                .retain(|(id, _)| !disconnected.contains(id));
        }
    }

    fn dispatch(self: &Arc<Self>, event: &BusEvent) {
        let handlers = match self.handlers.read().get(&event.event_type) {
            Some(handlers) if !handlers.is_empty() => handlers.clone(),
            _ => return,
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(event_type = %event.event_type, "No async runtime, handlers not dispatched");
                return;
            }
        };

        for handler in handlers {
            let bus = Arc::clone(self);
            let event = event.clone();
            runtime.spawn(async move {
                let event_type = event.event_type;
                let chain_id = event.chain_id.clone();
                if let Err(e) = handler.handle(bus, event).await {
                    error!(
                        event_type = %event_type,
                        chain_id = %chain_id,
                        error = %e,
                        "Event handler failed"
                    );
                }
            });
        }
    }
}
