use crate::error::SynapseError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifier of one agent known to the coordinator.
///
/// The set is closed: health records, call logs, checklist items and trigger
/// mappings can only reference these names. Parsing (and deserializing)
/// accepts a handful of aliases so that loosely-written checklist payloads
/// still resolve to a canonical agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentName {
    /// Builds and updates the debt-freedom payoff plan.
    #[serde(alias = "plan", alias = "payoff")]
    Freedom,
    /// Watches rates and offers, matching them against the user's loans.
    #[serde(alias = "rates", alias = "monitor")]
    Watchdog,
    /// Turns plan changes into advice for the user.
    #[serde(alias = "advisor")]
    Coach,
    /// Extracts structured data from uploaded documents.
    #[serde(alias = "documents", alias = "ocr")]
    Vision,
    /// Drafts letters to lenders.
    Letter,
    /// Argues both sides of a decision and concludes.
    #[serde(alias = "negotiation")]
    Debate,
    /// Prepares a phone-call script for talking to a lender.
    #[serde(alias = "call_script", alias = "callscript", alias = "script")]
    CallScript,
    /// Ranks candidate repayment strategies.
    Strategy,
}

impl AgentName {
    /// Every agent, in declaration order.
    pub const ALL: [AgentName; 8] = [
        AgentName::Freedom,
        AgentName::Watchdog,
        AgentName::Coach,
        AgentName::Vision,
        AgentName::Letter,
        AgentName::Debate,
        AgentName::CallScript,
        AgentName::Strategy,
    ];

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            AgentName::Freedom => "freedom",
            AgentName::Watchdog => "watchdog",
            AgentName::Coach => "coach",
            AgentName::Vision => "vision",
            AgentName::Letter => "letter",
            AgentName::Debate => "debate",
            AgentName::CallScript => "call-script",
            AgentName::Strategy => "strategy",
        }
    }
}

impl std::fmt::Display for AgentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentName {
    type Err = SynapseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = match s.trim().to_ascii_lowercase().as_str() {
            "freedom" | "plan" | "payoff" => AgentName::Freedom,
            "watchdog" | "rates" | "monitor" => AgentName::Watchdog,
            "coach" | "advisor" => AgentName::Coach,
            "vision" | "documents" | "ocr" => AgentName::Vision,
            "letter" => AgentName::Letter,
            "debate" | "negotiation" => AgentName::Debate,
            "call-script" | "call_script" | "callscript" | "script" => AgentName::CallScript,
            "strategy" => AgentName::Strategy,
            other => {
                return Err(SynapseError::Agent(format!("Unknown agent name: {other}")));
            }
        };
        Ok(name)
    }
}
