/// Anthropic Messages API backend.
pub mod claude;
/// OpenAI-compatible chat completions backend.
pub mod openai;

use async_trait::async_trait;
use synapse_core::SynapseResult;

/// Trait for LLM provider backends.
///
/// The coordinator only needs single-shot text completion: a system prompt,
/// one user prompt, and the raw text of the reply. Parsing that text is the
/// caller's job (the quality judge, for instance, parses it defensively).
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Complete `prompt` and return the raw reply text.
    async fn complete(&self, system_prompt: Option<&str>, prompt: &str) -> SynapseResult<String>;
}
