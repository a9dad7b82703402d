use serde::Deserialize;
use std::path::Path;
use synapse_agent::ModelConfig;
use synapse_orchestrator::OrchestratorConfig;

/// Contents of `synapse.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct SynapseConfig {
    /// Model that grades agent output. Without it every call is scored neutrally.
    #[serde(default)]
    pub judge: Option<ModelConfig>,
    /// Model behind downstream agents. Without it no triggers are installed.
    #[serde(default)]
    pub agents: Option<ModelConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}

impl SynapseConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::parse(&text).map_err(|e| {
                anyhow::anyhow!("Failed to parse config file '{}': {e}", path.display())
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file '{}': {e}",
                path.display()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_agent::LlmProvider;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SynapseConfig::parse("").unwrap();
        assert!(config.judge.is_none());
        assert!(config.agents.is_none());
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.orchestrator.max_log_entries, 100);
    }

    #[test]
    fn test_full_config() {
        let config = SynapseConfig::parse(
            r#"
            [judge]
            provider = "groq"
            model_id = "llama-3.1-8b-instant"
            api_key_env = "GROQ_API_KEY"

            [agents]
            provider = "claude"
            model_id = "claude-sonnet-4-5"
            api_key_env = "ANTHROPIC_API_KEY"
            max_tokens = 512

            [server]
            port = 8080

            [orchestrator]
            default_max_retries = 2
            replay_events = 10
            "#,
        )
        .unwrap();
        let judge = config.judge.unwrap();
        assert_eq!(judge.provider, LlmProvider::Groq);
        assert_eq!(judge.api_key_env.as_deref(), Some("GROQ_API_KEY"));
        assert_eq!(config.agents.unwrap().max_tokens, 512);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.orchestrator.default_max_retries, 2);
        assert_eq!(config.orchestrator.replay_events, 10);
        assert_eq!(config.orchestrator.max_event_log, 200);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let err = SynapseConfig::parse(
            r#"
            [judge]
            provider = "mystery"
            model_id = "x"
            "#,
        );
        assert!(err.is_err());
    }
}
