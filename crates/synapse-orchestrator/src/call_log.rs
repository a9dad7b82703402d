use crate::types::CallLog;
use std::collections::VecDeque;
use synapse_core::AgentName;

/// Fixed-capacity ring buffer of [`CallLog`]s; the oldest entry is evicted first.
#[derive(Debug)]
pub struct CallLogBuffer {
    entries: VecDeque<CallLog>,
    capacity: usize,
}

impl CallLogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a log, evicting the oldest entry when full.
    pub fn push(&mut self, log: CallLog) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(log);
    }

    /// Up to `limit` most recent logs, newest first.
    pub fn recent(&self, limit: usize) -> Vec<CallLog> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Up to `limit` most recent logs for one agent, newest first.
    pub fn recent_for(&self, agent: AgentName, limit: usize) -> Vec<CallLog> {
        self.entries
            .iter()
            .rev()
            .filter(|log| log.agent == agent)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn log(agent: AgentName, duration_ms: u64) -> CallLog {
        CallLog {
            id: Uuid::new_v4(),
            agent,
            timestamp: Utc::now(),
            duration_ms,
            success: true,
            quality_score: 80,
            quality_reasoning: String::new(),
            retry_count: 0,
            input_summary: String::new(),
            output_summary: String::new(),
            correction: None,
            error: None,
        }
    }

    #[test]
    fn test_evicts_oldest_past_capacity() {
        let mut buffer = CallLogBuffer::new(3);
        for ms in 0..5 {
            buffer.push(log(AgentName::Vision, ms));
        }
        assert_eq!(buffer.len(), 3);
        let durations: Vec<u64> = buffer.recent(10).iter().map(|l| l.duration_ms).collect();
        assert_eq!(durations, vec![4, 3, 2]);
    }

    #[test]
    fn test_recent_for_filters_agent() {
        let mut buffer = CallLogBuffer::new(10);
        buffer.push(log(AgentName::Vision, 1));
        buffer.push(log(AgentName::Coach, 2));
        buffer.push(log(AgentName::Vision, 3));
        let vision = buffer.recent_for(AgentName::Vision, 10);
        assert_eq!(vision.len(), 2);
        assert_eq!(vision[0].duration_ms, 3);
    }

    #[test]
    fn test_recent_respects_limit() {
        let mut buffer = CallLogBuffer::new(10);
        assert!(buffer.is_empty());
        buffer.push(log(AgentName::Letter, 1));
        buffer.push(log(AgentName::Letter, 2));
        assert_eq!(buffer.recent(1).len(), 1);
    }
}
