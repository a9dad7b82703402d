use crate::types::QualityVerdict;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use synapse_agent::LlmBackend;
use synapse_core::{truncate, AgentName};
use tracing::{debug, warn};

const INPUT_CHARS: usize = 500;
const OUTPUT_CHARS: usize = 1500;

const JUDGE_SYSTEM_PROMPT: &str = "You are a strict quality reviewer for the output of an AI agent \
in a personal-finance assistant. You reply with a single JSON object and nothing else.";

/// Scores agent output with a secondary judge model.
///
/// The evaluator never fails: judge errors and unparsable replies degrade to
/// a neutral passing verdict flagged as `defaulted`.
pub struct QualityEvaluator {
    judge: Arc<dyn LlmBackend>,
    neutral_score: u8,
}

impl QualityEvaluator {
    pub fn new(judge: Arc<dyn LlmBackend>, neutral_score: u8) -> Self {
        Self {
            judge,
            neutral_score,
        }
    }

    /// Score `output` produced by `agent` for `input`.
    pub async fn evaluate(&self, agent: AgentName, input: &str, output: &str) -> QualityVerdict {
        let prompt = build_judge_prompt(agent, input, output);

        let raw = match self.judge.complete(Some(JUDGE_SYSTEM_PROMPT), &prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(agent = %agent, error = %e, "Judge call failed, using neutral score");
                return QualityVerdict::neutral(
                    self.neutral_score,
                    format!("Quality evaluation skipped: judge unavailable ({e})"),
                );
            }
        };

        match JudgeReply::parse(&raw) {
            Some(reply) => {
                debug!(agent = %agent, score = reply.score, critical = reply.has_critical_issue, "Judge verdict");
                reply.into_verdict()
            }
            None => {
                warn!(agent = %agent, raw = %truncate(&raw, 200), "Unparsable judge reply, using neutral score");
                QualityVerdict::neutral(
                    self.neutral_score,
                    "Quality evaluation defaulted: judge reply could not be parsed",
                )
            }
        }
    }
}

fn build_judge_prompt(agent: AgentName, input: &str, output: &str) -> String {
    format!(
        "Evaluate the output of the \"{agent}\" agent.\n\n\
         INPUT:\n{input}\n\n\
         OUTPUT:\n{output}\n\n\
         Rubric (score 0-100 overall):\n\
         1. Accuracy and specificity: concrete, correct figures and claims.\n\
         2. Completeness: addresses the whole input.\n\
         3. Safety: no harmful, misleading or non-compliant financial advice.\n\
         4. Structure: well-formed output in the shape the agent is expected to return.\n\n\
         Set hasCriticalIssue to true only if the output is wrong, unsafe, empty or malformed \
         enough that it should be regenerated.\n\n\
         Respond with JSON only:\n\
         {{\"score\": <0-100>, \"reasoning\": \"<one or two sentences>\", \
         \"hasCriticalIssue\": <true|false>, \"suggestedFix\": \"<instruction for a retry, optional>\"}}",
        input = truncate(input, INPUT_CHARS),
        output = truncate(output, OUTPUT_CHARS),
    )
}

/// A parsed judge reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeReply {
    pub score: u8,
    pub reasoning: String,
    pub has_critical_issue: bool,
    pub suggested_fix: Option<String>,
    /// Explicit pass/fail, when the judge was asked for one.
    pub pass: Option<bool>,
}

impl JudgeReply {
    /// Parse judge text defensively.
    ///
    /// Tolerates markdown fences, prose around the JSON object, trailing
    /// commas, numeric fields sent as strings, and snake_case keys. As a last
    /// resort a bare `score: N` in the text is accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        let body = strip_fences(raw);

        if let Some(value) = extract_object(body) {
            if let Some(reply) = Self::from_value(&value) {
                return Some(reply);
            }
        }

        let score = SCORE_RE
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())?;
        Some(Self {
            score: clamp_score(f64::from(score)),
            reasoning: truncate(raw.trim(), 300),
            has_critical_issue: false,
            suggested_fix: None,
            pass: None,
        })
    }

    fn from_value(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |names: &[&str]| names.iter().find_map(|n| obj.get(*n));

        let score = match field(&["score", "rating"])? {
            serde_json::Value::Number(n) => n.as_f64()?,
            serde_json::Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
            _ => return None,
        };

        let reasoning = field(&["reasoning", "justification", "reason"])
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let has_critical_issue = field(&["hasCriticalIssue", "has_critical_issue", "critical"])
            .map(as_flag)
            .unwrap_or(false);

        let suggested_fix = field(&["suggestedFix", "suggested_fix", "fix"])
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let pass = field(&["pass", "passed"]).map(as_flag);

        Some(Self {
            score: clamp_score(score),
            reasoning,
            has_critical_issue,
            suggested_fix,
            pass,
        })
    }

    /// Convert into a verdict.
    pub fn into_verdict(self) -> QualityVerdict {
        QualityVerdict {
            score: self.score,
            reasoning: self.reasoning,
            has_critical_issue: self.has_critical_issue,
            suggested_fix: self.suggested_fix,
            defaulted: false,
        }
    }
}

fn as_flag(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

fn clamp_score(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.round().clamp(0.0, 100.0) as u8
}

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid fence regex"));
static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid trailing comma regex"));
static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"?score"?\s*[:=]\s*"?(\d{1,3})"#).expect("valid score regex")
});

fn strip_fences(raw: &str) -> &str {
    FENCE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or(raw, |m| m.as_str())
}

fn extract_object(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let candidate = &text[start..=end];
    serde_json::from_str(candidate).ok().or_else(|| {
        let relaxed = TRAILING_COMMA_RE.replace_all(candidate, "$1");
        serde_json::from_str(&relaxed).ok()
    })
}
