use crate::agent::AgentName;
use thiserror::Error;

/// A convenience `Result` alias using [`SynapseError`].
pub type SynapseResult<T> = Result<T, SynapseError>;

/// Top-level error type for the Synapse workspace.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum SynapseError {
    /// An agent's unit of work failed.
    #[error("Agent error: {0}")]
    Agent(String),

    /// Every attempt of an orchestrated call failed.
    #[error("Agent '{agent}' failed after {attempts} attempt(s): {last_error}")]
    AttemptsExhausted {
        /// The agent that was called.
        agent: AgentName,
        /// How many attempts were made, including the first one.
        attempts: u32,
        /// Error text of the final attempt.
        last_error: String,
    },

    /// A single attempt exceeded its caller-supplied deadline.
    #[error("Agent '{agent}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The agent that was called.
        agent: AgentName,
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// An error from the quality judge model.
    #[error("Judge error: {0}")]
    Judge(String),

    /// An error from an outbound HTTP request (e.g. LLM API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error raised by the event bus or a downstream trigger.
    #[error("Bus error: {0}")]
    Bus(String),

    /// An error from the task checklist.
    #[error("Checklist error: {0}")]
    Checklist(String),

    /// An error from the HTTP gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
