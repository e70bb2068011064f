//! ReAct agent implementation
//!
//! Runs the reason → act → observe loop: the LLM alternates between
//! reasoning and tool invocation until it produces a final answer without
//! requesting any more tools.

use crate::executor::AgentExecutor;
use async_trait::async_trait;
use ensemble_core::{Agent, AgentResponse, Context, Result};

/// System prompt for the ReAct pattern
const REACT_SYSTEM_PROMPT: &str = "\
You are an AI assistant that follows the ReAct (Reason + Act) pattern.

For each step:
1. Reason: Think about what needs to be done next
2. Act: Use the appropriate tool to take action
3. Observe: Consider the tool's output

Continue this cycle until the task is complete. When you have achieved the \
goal, provide a final answer without using any more tools.

Important: Once you have all the information needed to answer the user's \
request, stop using tools and provide your final response.";

/// ReAct (Reason and Act) agent
///
/// # Example
///
/// ```no_run
/// use ensemble_runtime::{AgentRuntime, ExecutorConfig};
/// use ensemble_core::{Agent, Context};
///
/// # async fn example(runtime: AgentRuntime) -> ensemble_core::Result<()> {
/// let agent = runtime.create_react_agent(ExecutorConfig::default(), "researcher");
///
/// let mut context = Context::new();
/// let response = agent.execute("Find recent Rust releases".to_string(), &mut context).await?;
/// println!("{:?}", response.result);
/// # Ok(())
/// # }
/// ```
pub struct ReactAgent {
    executor: AgentExecutor,
    name: String,
}

impl ReactAgent {
    /// Create a new ReAct agent
    ///
    /// The executor's system prompt is expected to already carry the ReAct
    /// instructions; use [`ReactAgent::system_prompt`] when building it.
    pub fn new(executor: AgentExecutor, name: impl Into<String>) -> Self {
        Self {
            executor,
            name: name.into(),
        }
    }

    /// The system prompt driving the ReAct loop
    pub fn system_prompt() -> &'static str {
        REACT_SYSTEM_PROMPT
    }

    /// Get a reference to the underlying executor
    pub fn executor(&self) -> &AgentExecutor {
        &self.executor
    }
}

#[async_trait]
impl Agent for ReactAgent {
    async fn execute(&self, task: String, _context: &mut Context) -> Result<AgentResponse> {
        let outcome = self.executor.run(task).await?;

        let mut reasoning: Vec<String> = outcome
            .invocations
            .iter()
            .map(|inv| format!("Using tool: {}", inv.name))
            .collect();
        let actions: Vec<String> = outcome.invocations.iter().map(ToString::to_string).collect();

        if outcome.completed {
            reasoning.push("Generated final response".to_string());
            Ok(AgentResponse::succeeded(outcome.text, reasoning, actions))
        } else {
            Ok(AgentResponse::failed(
                "Max iterations reached without completing the task",
                reasoning,
                actions,
            ))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::AgentExecutorBuilder;
    use async_trait::async_trait;
    use ensemble_llm::{
        CompletionRequest, CompletionResponse, LlmProvider, Message, StopReason, TokenUsage,
    };
    use std::sync::Arc;

    struct OneShotProvider;

    #[async_trait]
    impl LlmProvider for OneShotProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> ensemble_llm::Result<CompletionResponse> {
            // The ReAct system prompt must ride along on every request
            assert!(request.system.as_deref().unwrap_or_default().contains("ReAct"));
            Ok(CompletionResponse {
                message: Message::assistant("final answer"),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage {
                    input_tokens: 1,
                    output_tokens: 1,
                },
            })
        }

        fn name(&self) -> &str {
            "one-shot"
        }
    }

    #[tokio::test]
    async fn test_react_agent_success() {
        let executor = AgentExecutorBuilder::new()
            .provider(Arc::new(OneShotProvider))
            .system_prompt(ReactAgent::system_prompt())
            .build()
            .unwrap();

        let agent = ReactAgent::new(executor, "react");
        let mut ctx = Context::new();

        let response = agent.execute("do the thing".to_string(), &mut ctx).await.unwrap();
        assert!(response.success);
        assert_eq!(response.result.as_deref(), Some("final answer"));
        assert_eq!(agent.name(), "react");
    }
}
