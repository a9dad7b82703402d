use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use synapse_core::AgentName;
use uuid::Uuid;

/// Three-level health classification of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Success rate and quality are both acceptable.
    Healthy,
    /// Success rate below 80% or average quality below 60.
    Degraded,
    /// Success rate below 50% or average quality below 40.
    Failing,
}

impl HealthStatus {
    /// Classify from a success rate percentage and an average quality score.
    pub fn derive(success_rate: u32, avg_quality_score: f64) -> Self {
        if success_rate < 50 || avg_quality_score < 40.0 {
            HealthStatus::Failing
        } else if success_rate < 80 || avg_quality_score < 60.0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Failing => write!(f, "failing"),
        }
    }
}

/// Outcome of scoring one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    /// Score in 0..=100.
    pub score: u8,
    /// The judge's justification.
    pub reasoning: String,
    /// Whether the output has a retry-worthy problem.
    pub has_critical_issue: bool,
    /// Correction hint for a retry, when the judge offered one.
    pub suggested_fix: Option<String>,
    /// True when the score is a stand-in rather than a real judgement.
    pub defaulted: bool,
}

impl QualityVerdict {
    /// A neutral passing verdict that records why no real judgement exists.
    pub fn neutral(score: u8, note: impl Into<String>) -> Self {
        Self {
            score,
            reasoning: note.into(),
            has_critical_issue: false,
            suggested_fix: None,
            defaulted: true,
        }
    }
}

/// One record per orchestrated call (all of its attempts).
///
/// Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLog {
    pub id: Uuid,
    pub agent: AgentName,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub quality_score: u8,
    pub quality_reasoning: String,
    pub retry_count: u32,
    pub input_summary: String,
    pub output_summary: String,
    /// The last correction applied before the final attempt.
    pub correction: Option<String>,
    pub error: Option<String>,
}

/// Rolling statistics for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealth {
    pub agent: AgentName,
    pub total_calls: u64,
    pub successful_calls: u64,
    /// Percentage of calls that succeeded, rounded.
    pub success_rate: u32,
    pub avg_quality_score: f64,
    pub avg_latency_ms: f64,
    pub last_call_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub status: HealthStatus,
    /// Most recent corrections, oldest first.
    pub recent_corrections: Vec<String>,
}

impl AgentHealth {
    /// A record for an agent that has not been called yet.
    pub fn new(agent: AgentName) -> Self {
        Self {
            agent,
            total_calls: 0,
            successful_calls: 0,
            success_rate: 100,
            avg_quality_score: 0.0,
            avg_latency_ms: 0.0,
            last_call_at: None,
            last_error: None,
            status: HealthStatus::Healthy,
            recent_corrections: Vec::new(),
        }
    }
}

/// Full snapshot of orchestrator state for dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorState {
    pub agents: BTreeMap<AgentName, AgentHealth>,
    /// Newest first.
    pub recent_logs: Vec<CallLog>,
    pub total_calls: u64,
    pub total_corrections: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_ms: u64,
}
