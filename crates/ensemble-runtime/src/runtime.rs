//! Runtime for executing agents with dependency injection
//!
//! The AgentRuntime manages shared resources (LLM provider, tool registry,
//! MCP configuration) and provides factory methods for creating agents.

use ensemble_core::Result;
use ensemble_llm::LlmProvider;
use ensemble_mcp::{McpConfig, McpServerPool};
use ensemble_tools::ToolRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::agents::ReactAgent;
use crate::executor::{AgentExecutor, ExecutorConfig};

/// Configuration for the agent runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Default maximum iterations for tool-using agents
    pub default_max_iterations: usize,

    /// Default model to use
    pub default_model: String,

    /// Path to MCP configuration file
    pub mcp_config_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_max_iterations: 10,
            default_model: "gpt-4.1-nano".to_string(),
            mcp_config_path: None,
        }
    }
}

/// Runtime for executing agents with dependency injection
///
/// # Example
///
/// ```no_run
/// use ensemble_runtime::{AgentRuntime, ExecutorConfig};
/// use ensemble_tools::ToolRegistry;
/// use std::sync::Arc;
///
/// # fn example(provider: Arc<dyn ensemble_llm::LlmProvider>) -> ensemble_core::Result<()> {
/// let runtime = AgentRuntime::builder()
///     .provider(provider)
///     .tool_registry(Arc::new(ToolRegistry::new()))
///     .build()?;
///
/// let agent = runtime.create_react_agent(ExecutorConfig::default(), "researcher");
/// # Ok(())
/// # }
/// ```
pub struct AgentRuntime {
    provider: Arc<dyn LlmProvider>,
    tool_registry: Arc<ToolRegistry>,
    config: RuntimeConfig,
    mcp_config: Option<Arc<McpConfig>>,
}

impl AgentRuntime {
    /// Create a new agent runtime
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tool_registry: Arc<ToolRegistry>,
        config: RuntimeConfig,
        mcp_config: Option<Arc<McpConfig>>,
    ) -> Self {
        Self {
            provider,
            tool_registry,
            config,
            mcp_config,
        }
    }

    /// Create a new runtime builder
    pub fn builder() -> AgentRuntimeBuilder {
        AgentRuntimeBuilder::new()
    }

    /// Get a reference to the LLM provider
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Get a reference to the tool registry
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tool_registry
    }

    /// Get a reference to the runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get a reference to the MCP configuration
    pub fn mcp_config(&self) -> Option<&Arc<McpConfig>> {
        self.mcp_config.as_ref()
    }

    /// Build an executor over the runtime's provider and registry
    pub fn create_executor(&self, config: ExecutorConfig) -> AgentExecutor {
        AgentExecutor::new(self.provider.clone(), self.tool_registry.clone(), config)
    }

    /// Create a ReAct agent using the runtime's tool registry
    ///
    /// # Arguments
    ///
    /// * `config` - Executor configuration (system prompt is overwritten
    ///   with the ReAct prompt)
    /// * `name` - Name of the agent
    pub fn create_react_agent(&self, mut config: ExecutorConfig, name: impl Into<String>) -> ReactAgent {
        config.system_prompt = Some(ReactAgent::system_prompt().to_string());
        let executor =
            AgentExecutor::new(self.provider.clone(), self.tool_registry.clone(), config);
        ReactAgent::new(executor, name)
    }

    /// Create a ReAct agent with MCP tools registered
    ///
    /// Discovers tools from the MCP servers configured for the agent and
    /// merges them with the runtime's existing tools. Falls back to a
    /// regular ReAct agent when MCP is not configured or unreachable.
    ///
    /// # Errors
    ///
    /// Returns an error only when MCP initialization fails hard; discovery
    /// problems degrade to the existing tool set.
    pub async fn create_react_agent_with_mcp(
        &self,
        mut config: ExecutorConfig,
        name: impl Into<String>,
    ) -> Result<ReactAgent> {
        let agent_name = name.into();
        config.system_prompt = Some(ReactAgent::system_prompt().to_string());

        let registry = self
            .assemble_mcp_registry(&agent_name)
            .await?
            .unwrap_or_else(|| self.tool_registry.clone());

        let executor = AgentExecutor::new(self.provider.clone(), registry, config);
        Ok(ReactAgent::new(executor, agent_name))
    }

    /// Build a registry combining runtime tools with MCP-discovered tools
    ///
    /// Returns `Ok(None)` when MCP is not configured for the agent, so the
    /// caller can reuse the plain registry.
    pub async fn assemble_mcp_registry(
        &self,
        agent_name: &str,
    ) -> Result<Option<Arc<ToolRegistry>>> {
        let Some(mcp_config) = &self.mcp_config else {
            info!("No MCP configuration found, using local tools only");
            return Ok(None);
        };

        let Some(agent_config) = mcp_config.get_agent_config(agent_name) else {
            info!(
                "No MCP configuration for agent '{}', using local tools only",
                agent_name
            );
            return Ok(None);
        };

        // Connect to the agent's servers
        let pool = Arc::new(McpServerPool::new(
            mcp_config.clone(),
            agent_name.to_string(),
        ));

        if let Err(e) = pool.initialize().await {
            warn!(
                "Failed to initialize MCP servers for agent '{}': {}. Continuing with local tools.",
                agent_name, e
            );
            return Ok(None);
        }

        // Fresh registry: local tools plus everything discovered
        let registry = ToolRegistry::new();
        for tool in self.tool_registry.list_tools() {
            registry.register(tool);
        }

        match ensemble_mcp::discovery::register_mcp_tools(pool, &registry, agent_config).await {
            Ok(count) => {
                info!(
                    "Registered {} MCP tools for agent '{}'",
                    count, agent_name
                );
            }
            Err(e) => {
                warn!(
                    "Failed to discover MCP tools for agent '{}': {}. Continuing with local tools.",
                    agent_name, e
                );
            }
        }

        Ok(Some(Arc::new(registry)))
    }
}

/// Builder for AgentRuntime
pub struct AgentRuntimeBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tool_registry: Option<Arc<ToolRegistry>>,
    config: RuntimeConfig,
    mcp_config: Option<Arc<McpConfig>>,
}

impl AgentRuntimeBuilder {
    /// Create a new runtime builder
    pub fn new() -> Self {
        Self {
            provider: None,
            tool_registry: None,
            config: RuntimeConfig::default(),
            mcp_config: None,
        }
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tool_registry = Some(registry);
        self
    }

    /// Set the runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the MCP configuration
    pub fn mcp_config(mut self, config: Arc<McpConfig>) -> Self {
        self.mcp_config = Some(config);
        self
    }

    /// Load MCP configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn mcp_config_from_file(mut self, path: PathBuf) -> Result<Self> {
        let config = McpConfig::from_file(&path)
            .map_err(|e| ensemble_core::Error::InitializationFailed(e.to_string()))?;
        self.config.mcp_config_path = Some(path);
        self.mcp_config = Some(Arc::new(config));
        Ok(self)
    }

    /// Set the default max iterations
    pub fn default_max_iterations(mut self, max: usize) -> Self {
        self.config.default_max_iterations = max;
        self
    }

    /// Set the default model
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    /// Build the runtime
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not set
    pub fn build(self) -> Result<AgentRuntime> {
        let provider = self.provider.ok_or_else(|| {
            ensemble_core::Error::InitializationFailed("Provider not set".to_string())
        })?;

        let tool_registry = self
            .tool_registry
            .unwrap_or_else(|| Arc::new(ToolRegistry::new()));

        Ok(AgentRuntime::new(
            provider,
            tool_registry,
            self.config,
            self.mcp_config,
        ))
    }
}

impl Default for AgentRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ensemble_core::Agent;
    use ensemble_llm::{CompletionRequest, CompletionResponse};
    use std::collections::HashMap;

    struct MockProvider;

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> ensemble_llm::Result<CompletionResponse> {
            Err(ensemble_llm::LlmError::RequestFailed("mock".to_string()))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[test]
    fn test_runtime_config_default() {
        let config = RuntimeConfig::default();
        assert_eq!(config.default_max_iterations, 10);
        assert_eq!(config.default_model, "gpt-4.1-nano");
        assert!(config.mcp_config_path.is_none());
    }

    #[test]
    fn test_runtime_builder() {
        let builder = AgentRuntimeBuilder::new()
            .default_max_iterations(5)
            .default_model("test-model");

        assert_eq!(builder.config.default_max_iterations, 5);
        assert_eq!(builder.config.default_model, "test-model");
    }

    #[test]
    fn test_build_requires_provider() {
        assert!(AgentRuntimeBuilder::new().build().is_err());
    }

    #[test]
    fn test_create_react_agent_sets_prompt() {
        let runtime = AgentRuntime::builder()
            .provider(Arc::new(MockProvider))
            .build()
            .unwrap();

        let agent = runtime.create_react_agent(ExecutorConfig::default(), "researcher");
        assert_eq!(agent.name(), "researcher");
        assert!(
            agent
                .executor()
                .config()
                .system_prompt
                .as_deref()
                .unwrap_or_default()
                .contains("ReAct")
        );
    }

    #[tokio::test]
    async fn test_mcp_registry_absent_without_config() {
        let runtime = AgentRuntime::builder()
            .provider(Arc::new(MockProvider))
            .build()
            .unwrap();

        let registry = runtime.assemble_mcp_registry("worker").await.unwrap();
        assert!(registry.is_none());
    }

    #[tokio::test]
    async fn test_mcp_registry_absent_for_unknown_agent() {
        let mcp_config = Arc::new(McpConfig {
            mcp_servers: HashMap::new(),
            agent_configurations: HashMap::new(),
        });

        let runtime = AgentRuntime::builder()
            .provider(Arc::new(MockProvider))
            .mcp_config(mcp_config)
            .build()
            .unwrap();

        let registry = runtime.assemble_mcp_registry("worker").await.unwrap();
        assert!(registry.is_none());
    }
}
