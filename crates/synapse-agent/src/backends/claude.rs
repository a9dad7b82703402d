use super::LlmBackend;
use crate::config::ModelConfig;
use async_trait::async_trait;
use synapse_core::{SynapseError, SynapseResult};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude (Anthropic) API backend.
pub struct ClaudeBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl ClaudeBackend {
    /// Create a backend for `config`.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    async fn complete(&self, system_prompt: Option<&str>, prompt: &str) -> SynapseResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url());
        let api_key = self.config.resolve_api_key()?;

        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(sys) = system_prompt {
            body["system"] = serde_json::Value::String(sys.to_string());
        }

        debug!(model = %self.config.model_id, "Claude completion request");

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
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
                "Claude API error {status}: {resp_body}"
            )));
        }

        parse_claude_response(&resp_body)
    }
}

/// Join the text blocks of a Messages API response.
pub fn parse_claude_response(body: &serde_json::Value) -> SynapseResult<String> {
    let content = body["content"]
        .as_array()
        .ok_or_else(|| SynapseError::Agent("Missing content in Claude response".into()))?;

    let text_parts: Vec<&str> = content
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect();

    Ok(text_parts.join("\n"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_parse_joins_text_blocks() {
        let body = serde_json::json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "tool_use", "id": "x", "name": "y", "input": {}},
                {"type": "text", "text": "second"}
            ],
            "stop_reason": "end_turn"
        });
        assert_eq!(parse_claude_response(&body).unwrap(), "first\nsecond");
    }

    #[test]
    fn test_parse_missing_content() {
        let body = serde_json::json!({"type": "error"});
        assert!(parse_claude_response(&body).is_err());
    }
}
