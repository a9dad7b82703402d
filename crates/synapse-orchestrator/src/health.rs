use crate::types::{AgentHealth, CallLog, HealthStatus};
use std::collections::BTreeMap;
use synapse_core::AgentName;

/// Tracks rolling health statistics for every agent.
///
/// One record per [`AgentName`] exists from construction; records are only
/// ever updated, never reset.
#[derive(Debug)]
pub struct HealthRegistry {
    records: BTreeMap<AgentName, AgentHealth>,
    max_recent_corrections: usize,
}

impl HealthRegistry {
    pub fn new(max_recent_corrections: usize) -> Self {
        let records = AgentName::ALL
            .iter()
            .map(|agent| (*agent, AgentHealth::new(*agent)))
            .collect();
        Self {
            records,
            max_recent_corrections,
        }
    }

    /// Fold one completed call into its agent's record.
    ///
    /// Averages use `new = (old * (n - 1) + value) / n`, which reduces to the
    /// exact mean over every call recorded so far.
    pub fn record(&mut self, log: &CallLog) -> &AgentHealth {
        let max_corrections = self.max_recent_corrections;
        let health = self
            .records
            .entry(log.agent)
            .or_insert_with(|| AgentHealth::new(log.agent));

        health.total_calls += 1;
        if log.success {
            health.successful_calls += 1;
        }
        let n = health.total_calls as f64;

        health.avg_quality_score =
            (health.avg_quality_score * (n - 1.0) + f64::from(log.quality_score)) / n;
        health.avg_latency_ms = (health.avg_latency_ms * (n - 1.0) + log.duration_ms as f64) / n;
        health.success_rate = ((health.successful_calls as f64 / n) * 100.0).round() as u32;
        health.last_call_at = Some(log.timestamp);

        if let Some(err) = &log.error {
            health.last_error = Some(err.clone());
        }
        if let Some(correction) = &log.correction {
            health.recent_corrections.push(correction.clone());
            let overflow = health
                .recent_corrections
                .len()
                .saturating_sub(max_corrections);
            health.recent_corrections.drain(..overflow);
        }

        health.status = HealthStatus::derive(health.success_rate, health.avg_quality_score);
        health
    }

    /// Get the record of a specific agent.
    pub fn get(&self, agent: AgentName) -> Option<&AgentHealth> {
        self.records.get(&agent)
    }

    /// Get a snapshot of every record.
    pub fn snapshot(&self) -> BTreeMap<AgentName, AgentHealth> {
        self.records.clone()
    }

    /// Agents currently in the given status.
    pub fn with_status(&self, status: HealthStatus) -> Vec<AgentName> {
        self.records
            .values()
            .filter(|h| h.status == status)
            .map(|h| h.agent)
            .collect()
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn call(agent: AgentName, success: bool, score: u8, ms: u64) -> CallLog {
        CallLog {
            id: Uuid::new_v4(),
            agent,
            timestamp: Utc::now(),
            duration_ms: ms,
            success,
            quality_score: score,
            quality_reasoning: String::new(),
            retry_count: 0,
            input_summary: String::new(),
            output_summary: String::new(),
            correction: None,
            error: (!success).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_initial_records() {
        let registry = HealthRegistry::default();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), AgentName::ALL.len());
        for health in snapshot.values() {
            assert_eq!(health.total_calls, 0);
            assert_eq!(health.status, HealthStatus::Healthy);
        }
    }

    #[test]
    fn test_averages_equal_exact_mean() {
        let mut registry = HealthRegistry::default();
        let scores = [90u8, 70, 40, 100, 55, 83, 61];
        let latencies = [120u64, 340, 95, 1000, 15, 250, 480];
        for (score, ms) in scores.iter().zip(latencies.iter()) {
            registry.record(&call(AgentName::Freedom, true, *score, *ms));
        }
        let health = registry.get(AgentName::Freedom).unwrap();
        let mean_q = scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64;
        let mean_l = latencies.iter().map(|l| *l as f64).sum::<f64>() / latencies.len() as f64;
        assert!((health.avg_quality_score - mean_q).abs() < 1e-9);
        assert!((health.avg_latency_ms - mean_l).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_rounds() {
        let mut registry = HealthRegistry::default();
        // 2 of 3 succeed -> 66.67 -> 67
        registry.record(&call(AgentName::Coach, true, 90, 10));
        registry.record(&call(AgentName::Coach, true, 90, 10));
        let health = registry.record(&call(AgentName::Coach, false, 0, 10)).clone();
        assert_eq!(health.success_rate, 67);
        assert_eq!(health.last_error.as_deref(), Some("boom"));
        // (90 + 90 + 0) / 3 = 60 and 67% -> degraded
        assert_eq!(health.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_success_rate_exactly_half_is_not_failing() {
        let mut registry = HealthRegistry::default();
        registry.record(&call(AgentName::Letter, true, 100, 10));
        let health = registry.record(&call(AgentName::Letter, false, 100, 10)).clone();
        assert_eq!(health.success_rate, 50);
        assert_eq!(health.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_success_rate_exactly_eighty_is_healthy() {
        let mut registry = HealthRegistry::default();
        for _ in 0..4 {
            registry.record(&call(AgentName::Debate, true, 80, 10));
        }
        let mut failed = call(AgentName::Debate, false, 80, 10);
        failed.quality_score = 80;
        let health = registry.record(&failed).clone();
        assert_eq!(health.success_rate, 80);
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_all_failures_is_failing() {
        let mut registry = HealthRegistry::default();
        registry.record(&call(AgentName::Watchdog, false, 0, 10));
        assert_eq!(registry.with_status(HealthStatus::Failing), vec![AgentName::Watchdog]);
    }

    #[test]
    fn test_recent_corrections_are_capped() {
        let mut registry = HealthRegistry::new(5);
        for i in 0..7 {
            let mut log = call(AgentName::Vision, true, 90, 10);
            log.correction = Some(format!("fix {i}"));
            registry.record(&log);
        }
        let health = registry.get(AgentName::Vision).unwrap();
        assert_eq!(health.recent_corrections.len(), 5);
        assert_eq!(health.recent_corrections[0], "fix 2");
        assert_eq!(health.recent_corrections[4], "fix 6");
    }
}
