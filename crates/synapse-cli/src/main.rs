mod config;

use clap::{Parser, Subcommand};
use config::SynapseConfig;
use std::path::PathBuf;
use std::sync::Arc;
use synapse_agent::{LlmBackend, LlmClient, ModelConfig};
use synapse_core::AgentName;
use synapse_gateway::GatewayServer;
use synapse_orchestrator::{
    downstream, AgentInvoker, Downstream, EventType, LlmAgentInvoker, Orchestrator,
    QualityEvaluator, SynapseContext, TestCase, TestHarness,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synapse", about = "Synapse: agent call orchestration and chain reactions")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "synapse.toml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List agents and the trigger table
    Agents,
    /// Run judge-graded test cases from a JSON file
    Eval {
        /// JSON array of test cases
        cases: PathBuf,
        /// Minimum score for a pass when the grader gives no verdict
        #[arg(long, default_value_t = 70)]
        threshold: u8,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn model(config: Option<&ModelConfig>) -> Option<Arc<dyn LlmBackend>> {
    config.map(|c| Arc::new(LlmClient::new(c.clone())) as Arc<dyn LlmBackend>)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine; keys may already be in the environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = SynapseConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            let judge = model(config.judge.as_ref());
            let invoker = model(config.agents.as_ref())
                .map(|llm| Arc::new(LlmAgentInvoker::new(llm)) as Arc<dyn AgentInvoker>);
            info!(
                judge = judge.is_some(),
                triggers = invoker.is_some(),
                "Starting Synapse gateway on {host}:{port}"
            );

            let ctx = SynapseContext::new(config.orchestrator, judge, invoker);
            let app = GatewayServer::build(ctx);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Synapse gateway listening on {addr}");
            axum::serve(listener, app).await?;
        }
        Commands::Agents => {
            println!("Agents:");
            for agent in AgentName::ALL {
                println!("  {agent}");
            }
            println!();
            println!("Triggers:");
            for event_type in EventType::ALL {
                match downstream(event_type) {
                    Downstream::Invoke { agent, emits } => {
                        println!(
                            "  {:<18} -> {:<12} -> {emits}",
                            event_type.as_str(),
                            agent.as_str()
                        );
                    }
                    Downstream::CompleteChain => {
                        println!("  {:<18} -> complete chain", event_type.as_str());
                    }
                    Downstream::Terminal => {}
                }
            }
        }
        Commands::Eval { cases, threshold } => {
            let text = tokio::fs::read_to_string(&cases).await.map_err(|e| {
                anyhow::anyhow!("Failed to read test cases '{}': {e}", cases.display())
            })?;
            let cases: Vec<TestCase> = serde_json::from_str(&text)?;

            let judge = model(config.judge.as_ref())
                .ok_or_else(|| anyhow::anyhow!("eval needs a [judge] model in the config"))?;
            let agents = model(config.agents.as_ref())
                .ok_or_else(|| anyhow::anyhow!("eval needs an [agents] model in the config"))?;

            let evaluator =
                QualityEvaluator::new(judge.clone(), config.orchestrator.neutral_quality_score);
            let orchestrator = Arc::new(Orchestrator::new(config.orchestrator, Some(evaluator)));
            let harness = TestHarness::new(orchestrator, judge).with_pass_threshold(threshold);
            let runner = LlmAgentInvoker::new(agents);

            info!(cases = cases.len(), "Running evaluation");
            let report = harness.run(&runner, &cases).await;

            for result in &report.results {
                let mark = if result.passed { "PASS" } else { "FAIL" };
                println!(
                    "{mark}  {:<24} {:<12} score={:>3} {}ms  {}",
                    result.name,
                    result.agent.as_str(),
                    result.score,
                    result.duration_ms,
                    result.reasoning
                );
                if let Some(err) = &result.error {
                    println!("      error: {err}");
                }
            }
            println!();
            println!(
                "{} passed, {} failed, average score {:.1}",
                report.passed, report.failed, report.avg_score
            );

            if report.failed > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
