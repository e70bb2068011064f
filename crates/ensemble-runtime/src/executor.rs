//! Agent executor for running agent loops
//!
//! The AgentExecutor implements the core agent loop pattern:
//! 1. Call LLM with conversation history and available tools
//! 2. Check stop reason
//! 3. If tool use requested, execute tools and loop back
//! 4. If completed, return final response
//!
//! The same loop serves the ReAct agent, plan-execute steps, and workflow
//! task nodes; each caller supplies its own system prompt and reads the
//! recorded tool invocations back out of the outcome.

use ensemble_core::Result;
use ensemble_llm::{
    CompletionRequest, ContentBlock, LlmProvider, Message, StopReason, ToolDefinition,
};
use ensemble_tools::ToolRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for agent execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of loop iterations (prevents infinite tool loops)
    pub max_iterations: usize,

    /// Model to use
    pub model: String,

    /// System prompt
    pub system_prompt: Option<String>,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature
    pub temperature: Option<f32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            model: "gpt-4.1-nano".to_string(),
            system_prompt: None,
            max_tokens: 4096,
            temperature: Some(0.1),
        }
    }
}

/// A tool call performed during an agent loop
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Tool name
    pub name: String,
    /// Arguments the LLM supplied
    pub arguments: serde_json::Value,
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

/// Result of running an agent loop
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Final assistant text
    pub text: String,

    /// Tool calls performed along the way, in order
    pub invocations: Vec<ToolInvocation>,

    /// False when the loop stopped without a natural completion
    /// (iteration budget exhausted or response truncated)
    pub completed: bool,
}

/// Executes an agent loop: LLM → tool calls → execution → loop back
pub struct AgentExecutor {
    provider: Arc<dyn LlmProvider>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl AgentExecutor {
    /// Create a new agent executor
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tool_registry: Arc<ToolRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            provider,
            tool_registry,
            config,
        }
    }

    /// Get the executor configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Get the LLM provider
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Execute the agent loop with a user message
    pub async fn run(&self, user_message: String) -> Result<ExecutionOutcome> {
        self.run_conversation(vec![Message::user(user_message)])
            .await
    }

    /// Execute the agent loop over an existing conversation
    ///
    /// # Arguments
    ///
    /// * `conversation` - Seed messages (typically one user message carrying
    ///   task, context variables, and prior results)
    ///
    /// # Returns
    ///
    /// The outcome once the LLM stops requesting tools, with every tool
    /// invocation recorded in order.
    pub async fn run_conversation(
        &self,
        mut conversation: Vec<Message>,
    ) -> Result<ExecutionOutcome> {
        let mut invocations = Vec::new();
        let mut iteration = 0;

        loop {
            iteration += 1;
            if iteration > self.config.max_iterations {
                warn!(
                    "Max iterations ({}) reached, stopping",
                    self.config.max_iterations
                );
                return Ok(ExecutionOutcome {
                    text: "Max iterations reached without completion".to_string(),
                    invocations,
                    completed: false,
                });
            }

            info!(
                "Agent iteration {}/{}",
                iteration, self.config.max_iterations
            );

            // Build tool definitions from the registry
            let tools = self.build_tool_definitions();
            debug!("Available tools: {}", tools.len());

            let mut request_builder = CompletionRequest::builder(&self.config.model)
                .messages(conversation.clone())
                .max_tokens(self.config.max_tokens);

            if let Some(system) = &self.config.system_prompt {
                request_builder = request_builder.system(system.clone());
            }

            if let Some(temperature) = self.config.temperature {
                request_builder = request_builder.temperature(temperature);
            }

            // Only advertise tools if we have any
            if !tools.is_empty() {
                request_builder = request_builder.tools(tools);
            }

            let response = self
                .provider
                .complete(request_builder.build())
                .await
                .map_err(|e| ensemble_core::Error::ProcessingFailed(e.to_string()))?;

            debug!(
                "LLM response - stop_reason: {:?}, tokens: {:?}",
                response.stop_reason, response.usage
            );

            // Add assistant message to conversation
            conversation.push(response.message.clone());

            match response.stop_reason {
                StopReason::EndTurn | StopReason::StopSequence => {
                    // Natural completion, extract text and return
                    debug!("Agent completed after {} iteration(s)", iteration);
                    let text = response.message.text().unwrap_or_default().to_string();
                    return Ok(ExecutionOutcome {
                        text,
                        invocations,
                        completed: true,
                    });
                }

                StopReason::ToolUse => {
                    debug!("Agent requested tool use");
                    let results = self
                        .execute_tools(&response.message, &mut invocations)
                        .await?;

                    if results.is_empty() {
                        warn!("No tool results despite ToolUse stop reason");
                        return Ok(ExecutionOutcome {
                            text: "Tool execution produced no results".to_string(),
                            invocations,
                            completed: false,
                        });
                    }

                    // Feed results back and continue the loop
                    conversation.extend(results);
                }

                StopReason::MaxTokens => {
                    warn!("Hit max tokens in LLM response");
                    return Ok(ExecutionOutcome {
                        text: response.message.text().unwrap_or_default().to_string(),
                        invocations,
                        completed: false,
                    });
                }
            }
        }
    }

    /// Build tool definitions from the registry
    fn build_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tool_registry
            .list_tools()
            .iter()
            .map(|tool| ToolDefinition::new(tool.name(), tool.description(), tool.input_schema()))
            .collect()
    }

    /// Execute every tool call in an assistant message
    ///
    /// Failures (tool missing, tool error) come back as `is_error` tool
    /// results so the LLM can recover instead of the loop aborting.
    async fn execute_tools(
        &self,
        message: &Message,
        invocations: &mut Vec<ToolInvocation>,
    ) -> Result<Vec<Message>> {
        let mut results = Vec::new();

        let tool_uses = message.tool_uses();
        debug!("Executing {} tool(s)", tool_uses.len());

        for tool_use in tool_uses {
            if let ContentBlock::ToolUse { id, name, input } = tool_use {
                info!("Executing tool: {}", name);
                invocations.push(ToolInvocation {
                    name: name.clone(),
                    arguments: input.clone(),
                });

                let Some(tool) = self.tool_registry.get(name) else {
                    warn!("Tool not found: {}", name);
                    results.push(Message::tool_error(
                        id.clone(),
                        format!("Error: tool '{name}' is not available"),
                    ));
                    continue;
                };

                match tool.execute(input.clone()).await {
                    Ok(result) => {
                        debug!("Tool {} succeeded", name);
                        let result_str = match &result {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        results.push(Message::tool_result(id.clone(), result_str));
                    }
                    Err(e) => {
                        warn!("Tool {} execution failed: {}", name, e);
                        results.push(Message::tool_error(id.clone(), format!("Error: {e}")));
                    }
                }
            }
        }

        Ok(results)
    }
}

/// Builder for AgentExecutor
pub struct AgentExecutorBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl AgentExecutorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            provider: None,
            tool_registry: Arc::new(ToolRegistry::new()),
            config: ExecutorConfig::default(),
        }
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tool_registry = registry;
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set maximum iterations
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Set max tokens
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Build the executor
    pub fn build(self) -> Result<AgentExecutor> {
        let provider = self.provider.ok_or_else(|| {
            ensemble_core::Error::InitializationFailed("Provider not set".to_string())
        })?;

        Ok(AgentExecutor::new(provider, self.tool_registry, self.config))
    }
}

impl Default for AgentExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
