//! Fixed table of follow-up work fired by bus events.
//!
//! Each agent completion type maps to at most one downstream agent and the
//! event that agent emits when it finishes. The table is an exhaustive
//! `match`, so adding an [`EventType`] forces a decision here.

use crate::bus::{BusEvent, EventBus, EventDraft, EventHandler, EventType, MAX_HOP_DEPTH};
use crate::engine::{CallOptions, Orchestrator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use synapse_agent::LlmBackend;
use synapse_core::{truncate, truncate_json, AgentName, SynapseError, SynapseResult};
use tracing::{debug, info, warn};

/// What happens after an event of a given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Downstream {
    /// Run `agent` through the orchestrator, then emit `emits` one hop deeper.
    Invoke { agent: AgentName, emits: EventType },
    /// Close the chain.
    CompleteChain,
    /// Nothing follows.
    Terminal,
}

/// The trigger table.
pub fn downstream(event_type: EventType) -> Downstream {
    use Downstream::{CompleteChain, Invoke, Terminal};
    match event_type {
        EventType::VisionExtracted => Invoke {
            agent: AgentName::Watchdog,
            emits: EventType::WatchdogMatched,
        },
        EventType::WatchdogMatched => Invoke {
            agent: AgentName::Freedom,
            emits: EventType::FreedomUpdated,
        },
        EventType::FreedomUpdated => Invoke {
            agent: AgentName::Coach,
            emits: EventType::CoachAdvised,
        },
        EventType::CoachAdvised => CompleteChain,
        EventType::DebateConcluded => Invoke {
            agent: AgentName::Letter,
            emits: EventType::LetterDrafted,
        },
        EventType::LetterDrafted => Invoke {
            agent: AgentName::CallScript,
            emits: EventType::CallScriptReady,
        },
        EventType::StrategyRanked => Invoke {
            agent: AgentName::Freedom,
            emits: EventType::FreedomUpdated,
        },
        EventType::CallScriptReady | EventType::ChainComplete => Terminal,
    }
}

/// Result of a downstream agent's work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    /// One-line, human-readable result; becomes the follow-up event summary.
    pub summary: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl AgentOutput {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Performs one downstream agent's work in reaction to a causal event.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, agent: AgentName, cause: &BusEvent) -> SynapseResult<AgentOutput>;
}

const INVOKER_SYSTEM_PROMPT: &str = "You are one agent in a team of personal-finance assistants. \
Another agent has just finished a step. Continue the work from your own role and reply in two or \
three plain sentences.";

/// Default [`AgentInvoker`] that asks a model to continue from the causal event.
pub struct LlmAgentInvoker {
    llm: Arc<dyn LlmBackend>,
}

impl LlmAgentInvoker {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }

    pub(crate) fn llm(&self) -> &Arc<dyn LlmBackend> {
        &self.llm
    }
}

#[async_trait]
impl AgentInvoker for LlmAgentInvoker {
    async fn invoke(&self, agent: AgentName, cause: &BusEvent) -> SynapseResult<AgentOutput> {
        let prompt = format!(
            "Your role: the \"{agent}\" agent.\n\
             Upstream step: {event_type} from the \"{source}\" agent.\n\
             Upstream summary: {summary}\n\
             Upstream data: {payload}\n\n\
             What is your follow-up?",
            event_type = cause.event_type,
            source = cause.source,
            summary = truncate(&cause.summary, 500),
            payload = truncate_json(&cause.payload, 1500),
        );
        let text = self.llm.complete(Some(INVOKER_SYSTEM_PROMPT), &prompt).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SynapseError::Agent(format!("{agent} returned an empty reply")));
        }
        Ok(AgentOutput::new(truncate(text, 280)).with_payload(serde_json::json!({ "text": text })))
    }
}

struct TriggerHandler {
    agent: AgentName,
    emits: EventType,
    orchestrator: Arc<Orchestrator>,
    invoker: Arc<dyn AgentInvoker>,
}

#[async_trait]
impl EventHandler for TriggerHandler {
    async fn handle(&self, bus: Arc<EventBus>, event: BusEvent) -> SynapseResult<()> {
        if event.depth >= MAX_HOP_DEPTH {
            debug!(
                event_type = %event.event_type,
                chain_id = %event.chain_id,
                depth = event.depth,
                agent = %self.agent,
                "Depth limit reached, downstream agent not triggered"
            );
            return Ok(());
        }

        let input = format!(
            "{} from {}: {}",
            event.event_type,
            event.source,
            truncate(&event.summary, 200)
        );

        let outcome = self
            .orchestrator
            .orchestrate(
                self.agent,
                &input,
                || self.invoker.invoke(self.agent, &event),
                CallOptions::new()
                    .skip_quality_check()
                    .project(|output: &AgentOutput| output.summary.clone()),
            )
            .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                bus.fail_chain(&event.chain_id, &e.to_string());
                return Err(SynapseError::Bus(format!(
                    "{} trigger for {} failed: {e}",
                    event.event_type, self.agent
                )));
            }
        };

        let draft = EventDraft::follow_up(&event, self.agent, outcome.result.summary)
            .payload(outcome.result.payload)
            .duration_ms(outcome.log.duration_ms);

        match bus.emit(self.emits, draft) {
            Some(next) => info!(
                event_type = %next.event_type,
                chain_id = %next.chain_id,
                depth = next.depth,
                duration_ms = outcome.log.duration_ms,
                "Downstream event emitted"
            ),
            None => warn!(
                event_type = %self.emits,
                chain_id = %event.chain_id,
                "Downstream event rejected by bus"
            ),
        }
        Ok(())
    }
}

struct ChainTerminator;

#[async_trait]
impl EventHandler for ChainTerminator {
    async fn handle(&self, bus: Arc<EventBus>, event: BusEvent) -> SynapseResult<()> {
        if bus.complete_chain(&event.chain_id).is_none() {
            debug!(chain_id = %event.chain_id, "Chain already completed or evicted");
        }
        Ok(())
    }
}

/// Installs the trigger table onto a bus.
pub struct TriggerRegistry {
    orchestrator: Arc<Orchestrator>,
    invoker: Arc<dyn AgentInvoker>,
}

impl TriggerRegistry {
    pub fn new(orchestrator: Arc<Orchestrator>, invoker: Arc<dyn AgentInvoker>) -> Self {
        Self {
            orchestrator,
            invoker,
        }
    }

    /// Register one handler per non-terminal event type. Call once per bus.
    /// Returns the number of handlers registered.
    pub fn install(&self, bus: &EventBus) -> usize {
        let mut installed = 0;
        for event_type in EventType::ALL {
            let handler: Arc<dyn EventHandler> = match downstream(event_type) {
                Downstream::Invoke { agent, emits } => Arc::new(TriggerHandler {
                    agent,
                    emits,
                    orchestrator: Arc::clone(&self.orchestrator),
                    invoker: Arc::clone(&self.invoker),
                }),
                Downstream::CompleteChain => Arc::new(ChainTerminator),
                Downstream::Terminal => continue,
            };
            bus.register_handler(event_type, handler);
            installed += 1;
        }
        info!(handlers = installed, "Downstream triggers installed");
        installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChainStatus;
    use crate::config::OrchestratorConfig;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct EchoInvoker;

    #[async_trait]
    impl AgentInvoker for EchoInvoker {
        async fn invoke(&self, agent: AgentName, cause: &BusEvent) -> SynapseResult<AgentOutput> {
            Ok(AgentOutput::new(format!("{agent} handled {}", cause.event_type)))
        }
    }

    struct FailingInvoker;

    #[async_trait]
    impl AgentInvoker for FailingInvoker {
        async fn invoke(&self, agent: AgentName, _cause: &BusEvent) -> SynapseResult<AgentOutput> {
            Err(SynapseError::Agent(format!("{agent} unavailable")))
        }
    }

    fn wired(invoker: Arc<dyn AgentInvoker>) -> (Arc<EventBus>, Arc<Orchestrator>) {
        let config = OrchestratorConfig::default();
        let bus = EventBus::new(&config);
        let orchestrator = Arc::new(Orchestrator::new(config, None));
        TriggerRegistry::new(orchestrator.clone(), invoker).install(&bus);
        (bus, orchestrator)
    }

    async fn next(rx: &mut UnboundedReceiver<BusEvent>) -> BusEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within deadline")
            .expect("channel open")
    }

    #[test]
    fn test_table_is_closed_and_acyclic_per_hop() {
        for event_type in EventType::ALL {
            if let Downstream::Invoke { agent, emits } = downstream(event_type) {
                assert_eq!(emits.emitter(), Some(agent));
                assert_ne!(emits, EventType::ChainComplete);
            }
        }
        assert_eq!(downstream(EventType::CoachAdvised), Downstream::CompleteChain);
        assert_eq!(downstream(EventType::CallScriptReady), Downstream::Terminal);
        assert_eq!(downstream(EventType::ChainComplete), Downstream::Terminal);
    }

    #[test]
    fn test_install_registers_non_terminal_types() {
        let config = OrchestratorConfig::default();
        let bus = EventBus::new(&config);
        let orchestrator = Arc::new(Orchestrator::new(config, None));
        let installed = TriggerRegistry::new(orchestrator, Arc::new(EchoInvoker)).install(&bus);
        assert_eq!(installed, 7);
        assert_eq!(bus.handler_count(EventType::VisionExtracted), 1);
        assert_eq!(bus.handler_count(EventType::CallScriptReady), 0);
        assert_eq!(bus.handler_count(EventType::ChainComplete), 0);
    }

    #[tokio::test]
    async fn test_vision_event_triggers_watchdog_one_hop_deeper() {
        let (bus, orchestrator) = wired(Arc::new(EchoInvoker));
        let (_sub, mut rx) = bus.subscribe_channel();

        let root = bus
            .emit(
                EventType::VisionExtracted,
                EventDraft::root(AgentName::Vision, EventBus::new_chain_id(), "2 loans found"),
            )
            .unwrap();

        assert_eq!(next(&mut rx).await.id, root.id);
        let hop = next(&mut rx).await;
        assert_eq!(hop.event_type, EventType::WatchdogMatched);
        assert_eq!(hop.source, AgentName::Watchdog);
        assert_eq!(hop.depth, 1);
        assert_eq!(hop.triggered_by, Some(root.id));
        assert_eq!(hop.chain_id, root.chain_id);
        assert_eq!(hop.summary, "watchdog handled vision:extracted");

        let logs = orchestrator.recent_logs_for(AgentName::Watchdog, 10);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].quality_score, 75);
    }

    #[tokio::test]
    async fn test_no_trigger_at_depth_limit() {
        let (bus, orchestrator) = wired(Arc::new(EchoInvoker));
        let chain = EventBus::new_chain_id();
        bus.emit(
            EventType::FreedomUpdated,
            EventDraft::root(AgentName::Freedom, &chain, "plan at limit").depth(MAX_HOP_DEPTH),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(orchestrator.recent_logs(10).is_empty());
        assert_eq!(bus.chain(&chain).unwrap().events.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_trigger_marks_chain_error() {
        let (bus, orchestrator) = wired(Arc::new(FailingInvoker));
        let chain = EventBus::new_chain_id();
        bus.emit(
            EventType::DebateConcluded,
            EventDraft::root(AgentName::Debate, &chain, "refinance wins"),
        )
        .unwrap();

        let mut status = ChainStatus::Running;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = bus.chain(&chain).unwrap().status;
            if status == ChainStatus::Error {
                break;
            }
        }
        assert_eq!(status, ChainStatus::Error);
        let summary = bus.chain(&chain).unwrap();
        assert!(summary.error.unwrap().contains("letter unavailable"));

        // default_max_retries = 1: two attempts, one log
        let logs = orchestrator.recent_logs_for(AgentName::Letter, 10);
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].success);
        assert_eq!(logs[0].retry_count, 1);
    }
}
