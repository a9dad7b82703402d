use crate::call_log::CallLogBuffer;
use crate::config::OrchestratorConfig;
use crate::health::HealthRegistry;
use crate::quality::QualityEvaluator;
use crate::types::{AgentHealth, CallLog, OrchestratorState, QualityVerdict};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};
use synapse_core::{truncate, truncate_json, AgentName, SynapseError, SynapseResult};
use tracing::{info, warn};
use uuid::Uuid;

const OUTPUT_PROJECTION_CHARS: usize = 500;

/// Retry variant of a unit of work; receives the pending correction.
pub type RetryFn<'a, T> = Box<dyn Fn(String) -> BoxFuture<'a, SynapseResult<T>> + Send + Sync + 'a>;

/// Projects an output into the short text the judge sees.
pub type ProjectFn<'a, T> = Box<dyn Fn(&T) -> String + Send + Sync + 'a>;

/// Per-call options for [`Orchestrator::orchestrate`].
pub struct CallOptions<'a, T> {
    max_retries: Option<u32>,
    retry_with: Option<RetryFn<'a, T>>,
    project: Option<ProjectFn<'a, T>>,
    skip_quality_check: bool,
    timeout: Option<Duration>,
}

impl<'a, T> CallOptions<'a, T> {
    pub fn new() -> Self {
        Self {
            max_retries: None,
            retry_with: None,
            project: None,
            skip_quality_check: false,
            timeout: None,
        }
    }

    /// Retries after the first attempt. Defaults to the configured value.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Supply a retry variant. Attempts after the first call it with the
    /// pending correction, and critical quality findings become retryable.
    pub fn retry_with<F, Fut>(mut self, retry: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'a,
        Fut: Future<Output = SynapseResult<T>> + Send + 'a,
    {
        self.retry_with = Some(Box::new(move |correction| Box::pin(retry(correction))));
        self
    }

    /// Supply an output projector for quality evaluation and the log summary.
    pub fn project<F>(mut self, project: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'a,
    {
        self.project = Some(Box::new(project));
        self
    }

    /// Skip quality evaluation; the call is logged with the neutral score.
    pub fn skip_quality_check(mut self) -> Self {
        self.skip_quality_check = true;
        self
    }

    /// Deadline per attempt. An elapsed attempt counts as a failed one.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<T> Default for CallOptions<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Successful result of an orchestrated call.
#[derive(Debug, Clone)]
pub struct CallOutcome<T> {
    pub result: T,
    pub log: CallLog,
    pub verdict: QualityVerdict,
}

struct OrchestratorInner {
    health: HealthRegistry,
    logs: CallLogBuffer,
    total_calls: u64,
    total_corrections: u64,
}

/// Wraps agent calls with timing, quality evaluation, bounded retry, and
/// health bookkeeping. It is the only writer of call logs and health records.
pub struct Orchestrator {
    config: OrchestratorConfig,
    evaluator: Option<QualityEvaluator>,
    inner: Mutex<OrchestratorInner>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl Orchestrator {
    /// Create an orchestrator. Without an evaluator every call is logged
    /// with the neutral quality score.
    pub fn new(config: OrchestratorConfig, evaluator: Option<QualityEvaluator>) -> Self {
        let inner = OrchestratorInner {
            health: HealthRegistry::new(config.max_recent_corrections),
            logs: CallLogBuffer::new(config.max_log_entries),
            total_calls: 0,
            total_corrections: 0,
        };
        Self {
            config,
            evaluator,
            inner: Mutex::new(inner),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one agent call through the attempt loop.
    ///
    /// Exactly one [`CallLog`] is appended and one health update applied per
    /// invocation, whether it succeeds or fails. Only invocation failures
    /// that outlast every retry are returned as errors.
    pub async fn orchestrate<T, F, Fut>(
        &self,
        agent: AgentName,
        input: &str,
        work: F,
        options: CallOptions<'_, T>,
    ) -> SynapseResult<CallOutcome<T>>
    where
        T: Serialize,
        F: Fn() -> Fut,
        Fut: Future<Output = SynapseResult<T>>,
    {
        let max_retries = options.max_retries.unwrap_or(self.config.default_max_retries);
        let start = Instant::now();
        let mut attempt: u32 = 0;
        let mut retry_count: u32 = 0;
        let mut correction: Option<String> = None;

        loop {
            let outcome = match (&options.retry_with, &correction) {
                (Some(retry), Some(fix)) if attempt > 0 => {
                    self.attempt(agent, retry(fix.clone()), options.timeout).await
                }
                _ => self.attempt(agent, work(), options.timeout).await,
            };

            match outcome {
                Ok(output) => {
                    let projected = match &options.project {
                        Some(project) => project(&output),
                        None => truncate_json(&output, OUTPUT_PROJECTION_CHARS),
                    };

                    let verdict = match (&self.evaluator, options.skip_quality_check) {
                        (Some(evaluator), false) => evaluator.evaluate(agent, input, &projected).await,
                        _ => QualityVerdict::neutral(
                            self.config.neutral_quality_score,
                            "Quality check skipped",
                        ),
                    };

                    if verdict.has_critical_issue
                        && attempt < max_retries
                        && options.retry_with.is_some()
                    {
                        let fix = verdict.suggested_fix.clone().unwrap_or_else(|| {
                            format!("Fix the critical issue: {}", verdict.reasoning)
                        });
                        warn!(
                            agent = %agent,
                            attempt = attempt + 1,
                            score = verdict.score,
                            correction = %fix,
                            "Critical quality issue, retrying with correction"
                        );
                        correction = Some(fix);
                        retry_count += 1;
                        attempt += 1;
                        self.count_correction();
                        continue;
                    }

                    if verdict.has_critical_issue {
                        warn!(agent = %agent, score = verdict.score, "Critical quality issue logged without retry");
                    }

                    let log = CallLog {
                        id: Uuid::new_v4(),
                        agent,
                        timestamp: Utc::now(),
                        duration_ms: elapsed_ms(start),
                        success: true,
                        quality_score: verdict.score,
                        quality_reasoning: verdict.reasoning.clone(),
                        retry_count,
                        input_summary: truncate(input, self.config.summary_chars),
                        output_summary: truncate(&projected, self.config.summary_chars),
                        correction,
                        error: None,
                    };
                    self.record(&log);

                    info!(
                        agent = %agent,
                        duration_ms = log.duration_ms,
                        quality = log.quality_score,
                        retries = retry_count,
                        "Agent call completed"
                    );

                    return Ok(CallOutcome {
                        result: output,
                        log,
                        verdict,
                    });
                }
                Err(e) => {
                    if attempt < max_retries {
                        warn!(
                            agent = %agent,
                            attempt = attempt + 1,
                            error = %e,
                            "Agent call failed, retrying"
                        );
                        correction = Some(format!(
                            "Auto-retry after error: {}",
                            truncate(&e.to_string(), 120)
                        ));
                        retry_count += 1;
                        attempt += 1;
                        self.count_correction();
                        continue;
                    }

                    let last_error = e.to_string();
                    let log = CallLog {
                        id: Uuid::new_v4(),
                        agent,
                        timestamp: Utc::now(),
                        duration_ms: elapsed_ms(start),
                        success: false,
                        quality_score: 0,
                        quality_reasoning: "All attempts failed".to_string(),
                        retry_count,
                        input_summary: truncate(input, self.config.summary_chars),
                        output_summary: String::new(),
                        correction,
                        error: Some(last_error.clone()),
                    };
                    self.record(&log);

                    warn!(
                        agent = %agent,
                        attempts = attempt + 1,
                        error = %last_error,
                        "Agent call failed, attempts exhausted"
                    );

                    return Err(SynapseError::AttemptsExhausted {
                        agent,
                        attempts: attempt + 1,
                        last_error,
                    });
                }
            }
        }
    }

    async fn attempt<T, Fut>(
        &self,
        agent: AgentName,
        fut: Fut,
        timeout: Option<Duration>,
    ) -> SynapseResult<T>
    where
        Fut: Future<Output = SynapseResult<T>>,
    {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
                Err(SynapseError::Timeout {
                    agent,
                    timeout_ms: limit.as_millis() as u64,
                })
            }),
            None => fut.await,
        }
    }

    fn record(&self, log: &CallLog) {
        let mut inner = self.inner.lock();
        inner.logs.push(log.clone());
        inner.health.record(log);
        inner.total_calls += 1;
    }

    fn count_correction(&self) {
        self.inner.lock().total_corrections += 1;
    }

    /// Health records of every agent.
    pub fn agent_health_map(&self) -> BTreeMap<AgentName, AgentHealth> {
        self.inner.lock().health.snapshot()
    }

    pub fn agent_health(&self, agent: AgentName) -> Option<AgentHealth> {
        self.inner.lock().health.get(agent).cloned()
    }

    /// Up to `limit` most recent call logs, newest first.
    pub fn recent_logs(&self, limit: usize) -> Vec<CallLog> {
        self.inner.lock().logs.recent(limit)
    }

    /// Up to `limit` most recent call logs of one agent, newest first.
    pub fn recent_logs_for(&self, agent: AgentName, limit: usize) -> Vec<CallLog> {
        self.inner.lock().logs.recent_for(agent, limit)
    }

    pub fn total_corrections(&self) -> u64 {
        self.inner.lock().total_corrections
    }

    /// Full state dump.
    pub fn state(&self) -> OrchestratorState {
        let inner = self.inner.lock();
        OrchestratorState {
            agents: inner.health.snapshot(),
            recent_logs: inner.logs.recent(self.config.max_log_entries),
            total_calls: inner.total_calls,
            total_corrections: inner.total_corrections,
            started_at: self.started_at,
            uptime_ms: elapsed_ms(self.started),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
