use crate::engine::{CallOptions, Orchestrator};
use crate::quality::JudgeReply;
use crate::triggers::LlmAgentInvoker;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use synapse_agent::LlmBackend;
use synapse_core::{truncate, AgentName, SynapseResult};
use tracing::{info, warn};

/// Score at or above which a case passes when the judge gives no explicit verdict.
pub const DEFAULT_PASS_THRESHOLD: u8 = 70;

fn default_timeout_ms() -> u64 {
    30_000
}

/// One evaluation case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub agent: AgentName,
    pub input: String,
    /// Natural-language success criteria given to the grader.
    pub criteria: String,
    /// Deadline for one attempt.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub agent: AgentName,
    pub passed: bool,
    pub score: u8,
    pub reasoning: String,
    pub duration_ms: u64,
    pub output: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub avg_score: f64,
}

impl TestReport {
    fn from_results(results: Vec<TestResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        let avg_score = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| f64::from(r.score)).sum::<f64>() / results.len() as f64
        };
        Self {
            failed: results.len() - passed,
            passed,
            avg_score,
            results,
        }
    }
}

/// Produces an agent's raw output for a test case.
#[async_trait]
pub trait CaseRunner: Send + Sync {
    async fn run_case(&self, case: &TestCase) -> SynapseResult<String>;
}

#[async_trait]
impl CaseRunner for LlmAgentInvoker {
    async fn run_case(&self, case: &TestCase) -> SynapseResult<String> {
        let system = format!(
            "You are the \"{}\" agent of a personal-finance assistant. Answer the user directly.",
            case.agent
        );
        self.llm().complete(Some(&system), &case.input).await
    }
}

/// Runs cases through the orchestrator and grades each output with a judge,
/// separately from the orchestrator's own quality gate.
pub struct TestHarness {
    orchestrator: Arc<Orchestrator>,
    judge: Arc<dyn LlmBackend>,
    pass_threshold: u8,
}

impl TestHarness {
    pub fn new(orchestrator: Arc<Orchestrator>, judge: Arc<dyn LlmBackend>) -> Self {
        Self {
            orchestrator,
            judge,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }

    pub fn with_pass_threshold(mut self, threshold: u8) -> Self {
        self.pass_threshold = threshold.min(100);
        self
    }

    /// Run every case in order.
    pub async fn run(&self, runner: &dyn CaseRunner, cases: &[TestCase]) -> TestReport {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let result = self.run_one(runner, case).await;
            info!(
                case = %result.name,
                agent = %result.agent,
                passed = result.passed,
                score = result.score,
                "Test case graded"
            );
            results.push(result);
        }
        TestReport::from_results(results)
    }

    async fn run_one(&self, runner: &dyn CaseRunner, case: &TestCase) -> TestResult {
        let start = Instant::now();
        let outcome = self
            .orchestrator
            .orchestrate(
                case.agent,
                &case.input,
                || runner.run_case(case),
                CallOptions::new().timeout(Duration::from_millis(case.timeout_ms)),
            )
            .await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let output = match outcome {
            Ok(outcome) => outcome.result,
            Err(e) => {
                return TestResult {
                    name: case.name.clone(),
                    agent: case.agent,
                    passed: false,
                    score: 0,
                    reasoning: "Agent call failed".to_string(),
                    duration_ms,
                    output: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let (passed, score, reasoning, error) = match self.grade(case, &output).await {
            Ok(reply) => {
                let passed = reply.pass.unwrap_or(reply.score >= self.pass_threshold);
                (passed, reply.score, reply.reasoning, None)
            }
            Err(e) => {
                warn!(case = %case.name, error = %e, "Grading failed");
                (false, 0, "Grading failed".to_string(), Some(e))
            }
        };

        TestResult {
            name: case.name.clone(),
            agent: case.agent,
            passed,
            score,
            reasoning,
            duration_ms,
            output: Some(output),
            error,
        }
    }

    async fn grade(&self, case: &TestCase, output: &str) -> Result<JudgeReply, String> {
        let prompt = format!(
            "Grade the output of the \"{agent}\" agent against the success criteria.\n\n\
             INPUT:\n{input}\n\n\
             SUCCESS CRITERIA:\n{criteria}\n\n\
             OUTPUT:\n{output}\n\n\
             Respond with JSON only:\n\
             {{\"pass\": <true|false>, \"score\": <0-100>, \"reasoning\": \"<one or two sentences>\"}}",
            agent = case.agent,
            input = truncate(&case.input, 500),
            criteria = case.criteria,
            output = truncate(output, 2000),
        );
        let raw = self
            .judge
            .complete(Some("You are a strict test grader. Reply with JSON only."), &prompt)
            .await
            .map_err(|e| e.to_string())?;
        JudgeReply::parse(&raw).ok_or_else(|| format!("unparsable grade: {}", truncate(&raw, 120)))
    }
}
