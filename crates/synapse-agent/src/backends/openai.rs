use super::LlmBackend;
use crate::config::{LlmProvider, ModelConfig};
use async_trait::async_trait;
use synapse_core::{SynapseError, SynapseResult};
use tracing::debug;

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, and any other provider that
/// implements the OpenAI chat completions API.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a backend for `config`.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_messages(&self, system_prompt: Option<&str>, prompt: &str) -> Vec<serde_json::Value> {
        let mut api_messages = Vec::with_capacity(2);
        if let Some(sys) = system_prompt {
            api_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }
        api_messages.push(serde_json::json!({
            "role": "user",
            "content": prompt
        }));
        api_messages
    }

    fn add_provider_headers(
        &self,
        request: reqwest::RequestBuilder,
        api_key: &str,
    ) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json");

        // OpenRouter requires extra headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request.header("X-Title", "Synapse")
        } else {
            request
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, system_prompt: Option<&str>, prompt: &str) -> SynapseResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let api_key = self.config.resolve_api_key()?;

        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": self.build_messages(system_prompt, prompt),
        });

        debug!(model = %self.config.model_id, "OpenAI-compatible completion request");

        let resp = self
            .add_provider_headers(self.http.post(&url), &api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SynapseError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SynapseError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(SynapseError::Http(format!(
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }
}

/// Extract the assistant text from a chat completions response body.
pub fn parse_openai_response(body: &serde_json::Value) -> SynapseResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SynapseError::Agent("Missing message content in OpenAI response".into()))
}
