use serde::{Deserialize, Serialize};

/// Tunables for the orchestrator, bus and gateway replay.
///
/// Every field has a default, so an empty `[orchestrator]` table is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Capacity of the call log ring buffer.
    pub max_log_entries: usize,
    /// Capacity of the bus event log.
    pub max_event_log: usize,
    /// Number of chain summaries retained before the oldest is evicted.
    pub max_chains: usize,
    /// Retries applied when a call does not specify its own.
    pub default_max_retries: u32,
    /// Score used when quality evaluation is skipped or the judge misbehaves.
    pub neutral_quality_score: u8,
    /// Corrections remembered per agent health record.
    pub max_recent_corrections: usize,
    /// Character cap for input/output summaries in call logs.
    pub summary_chars: usize,
    /// Events replayed to a late-joining live subscriber.
    pub replay_events: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_log_entries: 100,
            max_event_log: 200,
            max_chains: 100,
            default_max_retries: 1,
            neutral_quality_score: 75,
            max_recent_corrections: 5,
            summary_chars: 200,
            replay_events: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_uses_defaults() {
        let config: OrchestratorConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_log_entries, 100);
        assert_eq!(config.max_event_log, 200);
        assert_eq!(config.default_max_retries, 1);
        assert_eq!(config.max_recent_corrections, 5);
    }

    #[test]
    fn test_partial_override() {
        let config: OrchestratorConfig = toml::from_str("default_max_retries = 3").unwrap();
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.neutral_quality_score, 75);
    }
}
