use serde::{Deserialize, Serialize};
use synapse_core::{SynapseError, SynapseResult};

/// Which provider API a [`ModelConfig`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic Messages API.
    Claude,
    /// OpenAI chat completions.
    OpenAi,
    /// OpenRouter (OpenAI-compatible).
    OpenRouter,
    /// Groq cloud inference: OpenAI-compatible API.
    Groq,
}

/// Connection and sampling settings for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider API flavour.
    pub provider: LlmProvider,
    /// Model identifier sent to the provider.
    pub model_id: String,
    /// API key. Empty when `api_key_env` is used instead.
    #[serde(default)]
    pub api_key: String,
    /// Name of an environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Override for the provider's base URL.
    pub api_base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    1024
}

impl ModelConfig {
    /// Base URL for the configured provider.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::Claude => "https://api.anthropic.com",
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
            }
        }
    }

    /// Resolve the API key, reading `api_key_env` when the inline key is empty.
    pub fn resolve_api_key(&self) -> SynapseResult<String> {
        if !self.api_key.is_empty() {
            return Ok(self.api_key.clone());
        }
        match &self.api_key_env {
            Some(var) => std::env::var(var).map_err(|_| {
                SynapseError::Config(format!("Environment variable {var} is not set"))
            }),
            None => Err(SynapseError::Config(format!(
                "No API key configured for model {}",
                self.model_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_toml() {
        let config: ModelConfig = toml::from_str(
            r#"
            provider = "openai"
            model_id = "gpt-4o-mini"
            api_key = "sk-test"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, LlmProvider::OpenAi);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.base_url(), "https://api.openai.com");
        assert_eq!(config.resolve_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn test_base_url_override() {
        let config: ModelConfig = toml::from_str(
            r#"
            provider = "groq"
            model_id = "llama"
            api_base_url = "http://localhost:9999"
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url(), "http://localhost:9999");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let config: ModelConfig = toml::from_str(
            r#"
            provider = "claude"
            model_id = "claude-haiku"
            api_key_env = "SYNAPSE_TEST_UNSET_KEY_VARIABLE"
            "#,
        )
        .unwrap();
        let err = config.resolve_api_key().unwrap_err();
        assert!(matches!(err, SynapseError::Config(_)));
    }
}
