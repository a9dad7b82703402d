//! Session-scoped task checklists.
//!
//! Items are bound to an agent when created. A bus observer attached with
//! [`ChecklistStore::attach`] completes open items as soon as their agent
//! reports in; it only reads events and never influences delivery.

use crate::bus::{BusEvent, EventBus, Subscription};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use synapse_core::{AgentName, SynapseError, SynapseResult};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One human-facing task assigned to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub agent: AgentName,
    pub status: ChecklistStatus,
    /// Percentage in 0..=100.
    pub progress: u8,
    pub result: Option<String>,
    pub decision: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Item definition accepted by [`ChecklistStore::create_checklist`].
///
/// `agent` accepts any alias understood by [`AgentName`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChecklistItem {
    /// Generated as `task-<n>` when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub agent: AgentName,
}

impl NewChecklistItem {
    pub fn new(title: impl Into<String>, agent: AgentName) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            agent,
        }
    }
}

/// Partial update of one item. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecklistPatch {
    #[serde(default)]
    pub status: Option<ChecklistStatus>,
    /// Clamped to 0..=100.
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub decision: Option<String>,
}

impl ChecklistItem {
    fn apply(&mut self, patch: ChecklistPatch) {
        let now = Utc::now();
        if let Some(status) = patch.status {
            self.status = status;
            match status {
                ChecklistStatus::InProgress => {
                    self.started_at.get_or_insert(now);
                }
                ChecklistStatus::Completed | ChecklistStatus::Failed => {
                    self.started_at.get_or_insert(now);
                    self.completed_at = Some(now);
                }
                ChecklistStatus::Pending => {}
            }
        }
        if let Some(progress) = patch.progress {
            self.progress = progress.clamp(0, 100) as u8;
        }
        if patch.result.is_some() {
            self.result = patch.result;
        }
        if patch.decision.is_some() {
            self.decision = patch.decision;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ChecklistItem>,
}

impl ChecklistSession {
    /// Completed items as a percentage of all items.
    pub fn completion(&self) -> u8 {
        if self.items.is_empty() {
            return 0;
        }
        let done = self
            .items
            .iter()
            .filter(|i| i.status == ChecklistStatus::Completed)
            .count();
        ((done as f64 / self.items.len() as f64) * 100.0).round() as u8
    }
}

/// In-memory checklists keyed by session id.
#[derive(Debug, Default)]
pub struct ChecklistStore {
    sessions: Mutex<HashMap<String, ChecklistSession>>,
}

impl ChecklistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) the checklist of a session. Every item starts pending.
    pub fn create_checklist(
        &self,
        session_id: &str,
        items: Vec<NewChecklistItem>,
    ) -> SynapseResult<ChecklistSession> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(SynapseError::Checklist("session id must not be empty".into()));
        }

        let mut seen = HashSet::new();
        let mut materialized = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let id = item.id.unwrap_or_else(|| format!("task-{}", index + 1));
            if !seen.insert(id.clone()) {
                return Err(SynapseError::Checklist(format!("duplicate item id '{id}'")));
            }
            materialized.push(ChecklistItem {
                id,
                title: item.title,
                description: item.description,
                agent: item.agent,
                status: ChecklistStatus::Pending,
                progress: 0,
                result: None,
                decision: None,
                started_at: None,
                completed_at: None,
            });
        }

        let session = ChecklistSession {
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            items: materialized,
        };
        info!(session_id = %session_id, items = session.items.len(), "Checklist created");
        self.sessions
            .lock()
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    pub fn checklist(&self, session_id: &str) -> Option<ChecklistSession> {
        self.sessions.lock().get(session_id).cloned()
    }

    /// Apply a partial update. Returns `None` when the session or item is unknown.
    pub fn update_checklist_item(
        &self,
        session_id: &str,
        item_id: &str,
        patch: ChecklistPatch,
    ) -> Option<ChecklistItem> {
        let mut sessions = self.sessions.lock();
        let item = sessions
            .get_mut(session_id)?
            .items
            .iter_mut()
            .find(|item| item.id == item_id)?;
        item.apply(patch);
        Some(item.clone())
    }

    /// Every session, most recently created first.
    pub fn sessions(&self) -> Vec<ChecklistSession> {
        let mut sessions: Vec<ChecklistSession> = self.sessions.lock().values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    /// Complete every open item assigned to the event's source agent.
    /// Returns how many items changed.
    pub fn apply_event(&self, event: &BusEvent) -> usize {
        if !event.event_type.is_agent_completion() {
            return 0;
        }
        let now = Utc::now();
        let mut advanced = 0;
        let mut sessions = self.sessions.lock();
        for session in sessions.values_mut() {
            for item in session
                .items
                .iter_mut()
                .filter(|item| item.agent == event.source && item.status != ChecklistStatus::Completed)
            {
                item.status = ChecklistStatus::Completed;
                item.progress = 100;
                item.result = Some(event.summary.clone());
                item.started_at.get_or_insert(now);
                item.completed_at = Some(now);
                advanced += 1;
                debug!(
                    session_id = %session.session_id,
                    item_id = %item.id,
                    agent = %item.agent,
                    "Checklist item completed by event"
                );
            }
        }
        advanced
    }

    /// Observe `bus`. The subscription ends once the store is dropped.
    pub fn attach(self: &Arc<Self>, bus: &Arc<EventBus>) -> Subscription {
        let store: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(move |event| match store.upgrade() {
            Some(store) => {
                store.apply_event(event);
                Ok(())
            }
            None => Err(SynapseError::Checklist("checklist store dropped".into())),
        })
    }
}
