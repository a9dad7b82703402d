//! Agent call orchestration with health tracking and chain-reaction events.
//!
//! Wraps calls to fallible, latency-variable agents with timing, automated
//! quality scoring, bounded retry with corrective hints, and rolling health
//! metrics. Completion events flow over an in-process bus that can trigger
//! follow-up agents, forming depth-bounded chains that live subscribers and
//! the task checklist observe.
//!
//! # Main types
//!
//! - [`Orchestrator`]: Runs one agent call through the retry/quality loop.
//! - [`HealthRegistry`]: Rolling per-agent success, quality and latency stats.
//! - [`QualityEvaluator`]: Scores outputs with a secondary judge model.
//! - [`EventBus`]: Publish/subscribe of [`BusEvent`]s with hop-depth limits.
//! - [`TriggerRegistry`]: Fixed event → follow-up agent table.
//! - [`ChecklistStore`]: Session checklists auto-advanced by bus events.
//! - [`SynapseContext`]: Application-lifetime wiring of all of the above.

/// Chain-reaction event bus.
pub mod bus;
/// Bounded call log.
pub mod call_log;
/// Session task checklists.
pub mod checklist;
/// Orchestrator tunables.
pub mod config;
/// Application context.
pub mod context;
/// Call orchestration engine.
pub mod engine;
/// Judge-graded test harness.
pub mod harness;
/// Rolling per-agent health.
pub mod health;
/// Output quality evaluation.
pub mod quality;
/// Downstream trigger table.
pub mod triggers;
/// Shared orchestration types (CallLog, AgentHealth, etc.).
pub mod types;

pub use bus::{
    BusEvent, ChainStatus, ChainSummary, EventBus, EventDraft, EventHandler, EventType,
    Subscription, MAX_HOP_DEPTH, SUMMARY_DEPTH,
};
pub use call_log::CallLogBuffer;
pub use checklist::{
    ChecklistItem, ChecklistPatch, ChecklistSession, ChecklistStatus, ChecklistStore,
    NewChecklistItem,
};
pub use config::OrchestratorConfig;
pub use context::SynapseContext;
pub use engine::{CallOptions, CallOutcome, Orchestrator};
pub use harness::{CaseRunner, TestCase, TestHarness, TestReport, TestResult};
pub use health::HealthRegistry;
pub use quality::{JudgeReply, QualityEvaluator};
pub use triggers::{downstream, AgentInvoker, AgentOutput, Downstream, LlmAgentInvoker, TriggerRegistry};
pub use types::{AgentHealth, CallLog, HealthStatus, OrchestratorState, QualityVerdict};
