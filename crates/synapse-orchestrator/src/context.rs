use crate::bus::{BusEvent, ChainSummary, EventBus, EventDraft, EventType, Subscription};
use crate::checklist::{ChecklistItem, ChecklistPatch, ChecklistSession, ChecklistStore};
use crate::config::OrchestratorConfig;
use crate::engine::Orchestrator;
use crate::quality::QualityEvaluator;
use crate::triggers::{AgentInvoker, TriggerRegistry};
use crate::types::{AgentHealth, CallLog, OrchestratorState};
use std::collections::BTreeMap;
use std::sync::Arc;
use synapse_agent::LlmBackend;
use synapse_core::{AgentName, SynapseResult};
use tracing::info;

/// Application-lifetime wiring of the orchestrator, bus, triggers and
/// checklists. Construct one per process (or per test) and share it.
pub struct SynapseContext {
    orchestrator: Arc<Orchestrator>,
    bus: Arc<EventBus>,
    checklists: Arc<ChecklistStore>,
    checklist_subscription: Subscription,
}

impl SynapseContext {
    /// Wire a context.
    ///
    /// Without a `judge` every call gets the neutral quality score. Without
    /// an `invoker` no downstream triggers are installed and chains only
    /// advance through explicit emits.
    pub fn new(
        config: OrchestratorConfig,
        judge: Option<Arc<dyn LlmBackend>>,
        invoker: Option<Arc<dyn AgentInvoker>>,
    ) -> Arc<Self> {
        let evaluator =
            judge.map(|judge| QualityEvaluator::new(judge, config.neutral_quality_score));
        let bus = EventBus::new(&config);
        let orchestrator = Arc::new(Orchestrator::new(config, evaluator));

        let checklists = Arc::new(ChecklistStore::new());
        let checklist_subscription = checklists.attach(&bus);

        let triggers = match invoker {
            Some(invoker) => TriggerRegistry::new(Arc::clone(&orchestrator), invoker).install(&bus),
            None => 0,
        };
        info!(triggers, "Synapse context ready");

        Arc::new(Self {
            orchestrator,
            bus,
            checklists,
            checklist_subscription,
        })
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn checklists(&self) -> &Arc<ChecklistStore> {
        &self.checklists
    }

    pub fn config(&self) -> &OrchestratorConfig {
        self.orchestrator.config()
    }

    pub fn state(&self) -> OrchestratorState {
        self.orchestrator.state()
    }

    pub fn agent_health_map(&self) -> BTreeMap<AgentName, AgentHealth> {
        self.orchestrator.agent_health_map()
    }

    pub fn recent_logs(&self, limit: usize) -> Vec<CallLog> {
        self.orchestrator.recent_logs(limit)
    }

    pub fn emit(&self, event_type: EventType, draft: EventDraft) -> Option<BusEvent> {
        self.bus.emit(event_type, draft)
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&BusEvent) -> SynapseResult<()> + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    /// Events to replay to a late subscriber, oldest first.
    pub fn replay(&self) -> Vec<BusEvent> {
        self.bus.recent_events(self.config().replay_events)
    }

    pub fn chain(&self, chain_id: &str) -> Option<ChainSummary> {
        self.bus.chain(chain_id)
    }

    pub fn checklist(&self, session_id: &str) -> Option<ChecklistSession> {
        self.checklists.checklist(session_id)
    }

    pub fn update_checklist_item(
        &self,
        session_id: &str,
        item_id: &str,
        patch: ChecklistPatch,
    ) -> Option<ChecklistItem> {
        self.checklists
            .update_checklist_item(session_id, item_id, patch)
    }

    pub fn checklist_sessions(&self) -> Vec<ChecklistSession> {
        self.checklists.sessions()
    }
}

impl Drop for SynapseContext {
    fn drop(&mut self) {
        self.checklist_subscription.unsubscribe();
    }
}
