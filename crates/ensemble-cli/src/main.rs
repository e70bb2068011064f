//! Command-line interface for ensemble
//!
//! Runs a task through one of the three agent patterns:
//!
//! ```text
//! ensemble react "What changed in Rust 1.85?"
//! ensemble plan "Compare three mortgage offers and recommend one"
//! ensemble workflow "Research renewable energy markets" --definition research.json
//! ```
//!
//! Provider credentials come from the environment (`OPENAI_API_KEY` /
//! `OPENAI_API_BASE` or `ANTHROPIC_API_KEY`); MCP tool servers from
//! `.mcp.json` or `--mcp-config`.

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use ensemble_core::{Agent, AgentResponse, Context};
use ensemble_llm::LlmProvider;
use ensemble_llm::providers::{AnthropicProvider, OpenAiProvider};
use ensemble_runtime::{AgentRuntime, ExecutorConfig};
use ensemble_workflow::{
    PlanExecuteAgent, PlanExecuteConfig, WorkflowAgent, WorkflowConfig, WorkflowDefinition,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "ensemble")]
#[command(about = "Run LLM agent workflows from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// LLM provider to use
    #[arg(long, value_enum, default_value = "openai", global = true)]
    provider: Provider,

    /// Model identifier (defaults per provider)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Path to the MCP configuration file (defaults to .mcp.json when present)
    #[arg(long, global = true)]
    mcp_config: Option<PathBuf>,

    /// Tool-loop iteration budget
    #[arg(long, global = true)]
    max_iterations: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a task with the ReAct agent
    React {
        /// Task to accomplish
        task: String,
    },

    /// Run a task with the plan-execute agent
    Plan {
        /// Task to accomplish
        task: String,
    },

    /// Run a task through a workflow
    Workflow {
        /// Task to accomplish
        task: String,

        /// Workflow definition file (JSON); generated by the LLM when omitted
        #[arg(long)]
        definition: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    /// OpenAI or any OpenAI-compatible endpoint
    Openai,
    /// Anthropic Claude
    Anthropic,
}

impl Provider {
    fn default_model(self) -> &'static str {
        match self {
            Self::Openai => "gpt-4.1-nano",
            Self::Anthropic => "claude-sonnet-4-5-20250929",
        }
    }

    fn build(self) -> anyhow::Result<Arc<dyn LlmProvider>> {
        Ok(match self {
            Self::Openai => {
                Arc::new(OpenAiProvider::from_env().context("failed to configure OpenAI provider")?)
            }
            Self::Anthropic => Arc::new(
                AnthropicProvider::from_env().context("failed to configure Anthropic provider")?,
            ),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ensemble_utils::init_tracing();

    let cli = Cli::parse();

    let provider = cli.provider.build()?;
    let model = cli
        .model
        .clone()
        .unwrap_or_else(|| cli.provider.default_model().to_string());

    info!("Using provider '{}' with model '{}'", provider.name(), model);

    let mut runtime_builder = AgentRuntime::builder()
        .provider(provider.clone())
        .default_model(model.clone());

    // Explicit --mcp-config must load; the .mcp.json default is best effort
    if let Some(path) = &cli.mcp_config {
        runtime_builder = runtime_builder
            .mcp_config_from_file(path.clone())
            .with_context(|| format!("failed to load MCP config from {}", path.display()))?;
    } else if PathBuf::from(".mcp.json").exists() {
        runtime_builder = runtime_builder
            .mcp_config_from_file(PathBuf::from(".mcp.json"))
            .context("failed to load .mcp.json")?;
    }

    let runtime = runtime_builder.build()?;
    let mut context = Context::new();

    let response = match &cli.command {
        Command::React { task } => {
            let mut config = ExecutorConfig {
                model: model.clone(),
                ..ExecutorConfig::default()
            };
            if let Some(max) = cli.max_iterations {
                config.max_iterations = max;
            }

            let agent = runtime.create_react_agent_with_mcp(config, "react").await?;
            agent.execute(task.clone(), &mut context).await?
        }

        Command::Plan { task } => {
            let registry = runtime
                .assemble_mcp_registry("plan-execute")
                .await?
                .unwrap_or_else(|| runtime.tools().clone());

            let mut config = PlanExecuteConfig {
                model: model.clone(),
                ..PlanExecuteConfig::default()
            };
            if let Some(max) = cli.max_iterations {
                config.max_step_attempts = max;
            }

            let agent = PlanExecuteAgent::new(provider, registry, config, "plan-execute");
            agent.execute(task.clone(), &mut context).await?
        }

        Command::Workflow { task, definition } => {
            let registry = runtime
                .assemble_mcp_registry("workflow")
                .await?
                .unwrap_or_else(|| runtime.tools().clone());

            let mut config = WorkflowConfig {
                model: model.clone(),
                ..WorkflowConfig::default()
            };
            if let Some(max) = cli.max_iterations {
                config.max_tool_rounds = max;
            }

            let agent = match definition {
                Some(path) => {
                    let json = std::fs::read_to_string(path).with_context(|| {
                        format!("failed to read workflow definition from {}", path.display())
                    })?;
                    let definition = WorkflowDefinition::from_json(&json)
                        .context("invalid workflow definition")?;
                    WorkflowAgent::from_definition(provider, registry, definition, config, "workflow")?
                }
                None => WorkflowAgent::dynamic(provider, registry, config, "workflow"),
            };

            agent.execute(task.clone(), &mut context).await?
        }
    };

    report(&response);
    Ok(())
}

/// Print the run outcome; failures exit non-zero
fn report(response: &AgentResponse) {
    debug!("Reasoning trail: {}", response.reasoning);
    for action in &response.actions_taken {
        debug!("Action: {}", action);
    }

    if response.success {
        println!("{}", response.result.as_deref().unwrap_or_default());
    } else {
        eprintln!(
            "Run failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }
}
