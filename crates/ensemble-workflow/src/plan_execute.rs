//! Plan-execute agent
//!
//! Separates planning from execution: an LLM planner decomposes the task
//! into steps, each step runs through the executor tool loop with prior
//! step results as context, and failures trigger replanning up to a
//! bounded number of attempts before the run is abandoned.

use crate::plan::{Plan, PlanSpec};
use async_trait::async_trait;
use ensemble_core::{Agent, AgentResponse, Context, Result};
use ensemble_llm::{CompletionRequest, LlmProvider, Message, structured};
use ensemble_runtime::{AgentExecutor, ExecutorConfig};
use ensemble_tools::ToolRegistry;
use std::sync::Arc;
use tracing::{info, warn};

const STEP_SYSTEM_PROMPT: &str =
    "You are an execution agent. Use tools to complete the given step.";

/// Configuration for plan-execute runs
#[derive(Debug, Clone)]
pub struct PlanExecuteConfig {
    /// Model to use for planning, execution, and synthesis
    pub model: String,

    /// Maximum number of replanning rounds before giving up
    pub max_replans: usize,

    /// Tool-loop iteration budget per step
    pub max_step_attempts: usize,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature
    pub temperature: Option<f32>,

    /// Attempts for structured-JSON decoding rounds
    pub structured_retries: u32,
}

impl Default for PlanExecuteConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-nano".to_string(),
            max_replans: 15,
            max_step_attempts: 5,
            max_tokens: 4096,
            temperature: Some(0.1),
            structured_retries: 3,
        }
    }
}

/// Agent implementing the plan-execute pattern
///
/// # Example
///
/// ```no_run
/// use ensemble_workflow::{PlanExecuteAgent, PlanExecuteConfig};
/// use ensemble_tools::ToolRegistry;
/// use ensemble_core::{Agent, Context};
/// use std::sync::Arc;
///
/// # async fn example(provider: Arc<dyn ensemble_llm::LlmProvider>) -> ensemble_core::Result<()> {
/// let agent = PlanExecuteAgent::new(
///     provider,
///     Arc::new(ToolRegistry::new()),
///     PlanExecuteConfig::default(),
///     "planner",
/// );
///
/// let mut ctx = Context::new();
/// let response = agent.execute("Compare mortgage offers".to_string(), &mut ctx).await?;
/// # Ok(())
/// # }
/// ```
pub struct PlanExecuteAgent {
    provider: Arc<dyn LlmProvider>,
    step_executor: AgentExecutor,
    config: PlanExecuteConfig,
    name: String,
}

impl PlanExecuteAgent {
    /// Create a new plan-execute agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: PlanExecuteConfig,
        name: impl Into<String>,
    ) -> Self {
        let step_executor = AgentExecutor::new(
            provider.clone(),
            tools,
            ExecutorConfig {
                max_iterations: config.max_step_attempts,
                model: config.model.clone(),
                system_prompt: Some(STEP_SYSTEM_PROMPT.to_string()),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
        );

        Self {
            provider,
            step_executor,
            config,
            name: name.into(),
        }
    }

    /// Ask the LLM for an initial plan
    async fn create_plan(&self, task: &str) -> ensemble_llm::Result<Plan> {
        info!("Creating plan for task");

        let prompt = format!(
            r#"You are a strategic planner. Create a step-by-step plan to accomplish this task:

Task: {task}

Create a clear, actionable plan with specific steps. Each step should be a concrete action that can be executed independently.

Respond in JSON format:
{{
    "goal": "The overall goal",
    "steps": ["Step 1 description", "Step 2 description"]
}}"#
        );

        let request = CompletionRequest::builder(&self.config.model)
            .add_message(Message::user(prompt))
            .max_tokens(self.config.max_tokens)
            .build();

        let spec: PlanSpec = structured::request_structured(
            self.provider.as_ref(),
            &request,
            self.config.structured_retries,
        )
        .await?;

        Ok(Plan::from(spec))
    }

    /// Execute a single step through the tool loop
    ///
    /// Failure is ordinary data here (it feeds the replanner), so the
    /// error side is a plain message rather than a hard error.
    async fn execute_step(
        &self,
        step: &str,
        previous_results: &[(String, String)],
    ) -> std::result::Result<String, String> {
        let mut context = String::from("Previous step results:\n");
        for (key, value) in previous_results {
            context.push_str(&format!("{key}: {value}\n"));
        }

        let prompt = format!(
            "{context}\nCurrent step to execute: {step}\n\n\
             Use the available tools to complete this step. Provide the result when done."
        );

        match self.step_executor.run(prompt).await {
            Ok(outcome) if outcome.completed => Ok(outcome.text),
            Ok(_) => Err("Max attempts reached".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Build a fresh plan after a step failure
    async fn replan(
        &self,
        current_plan: &Plan,
        failed_step: usize,
        error: &str,
    ) -> ensemble_llm::Result<Plan> {
        info!("Creating new plan to address the failure");

        let mut completed_info = String::from("Completed steps:\n");
        for (i, step) in current_plan.completed_steps() {
            completed_info.push_str(&format!("- Step {}: {}\n", i + 1, step));
        }

        let prompt = format!(
            r#"The original goal was: {}

{completed_info}
Failed at step {}: {}
Error: {error}

Create a new plan that:
1. Builds on what has been completed
2. Addresses the failure
3. Achieves the original goal

Respond in JSON format:
{{
    "goal": "The overall goal",
    "steps": ["Step 1 description", "Step 2 description"]
}}"#,
            current_plan.goal,
            failed_step + 1,
            current_plan.steps[failed_step],
        );

        let request = CompletionRequest::builder(&self.config.model)
            .add_message(Message::user(prompt))
            .max_tokens(self.config.max_tokens)
            .build();

        let spec: PlanSpec = structured::request_structured(
            self.provider.as_ref(),
            &request,
            self.config.structured_retries,
        )
        .await?;

        let plan = Plan::from(spec);
        info!(
            "New plan created: {} ({} steps)",
            plan.goal,
            plan.steps.len()
        );

        Ok(plan)
    }

    /// Combine all step results into the final answer
    async fn synthesize(
        &self,
        task: &str,
        step_results: &[(String, String)],
    ) -> Result<String> {
        info!(
            "Synthesizing results from {} completed steps",
            step_results.len()
        );

        let mut results_block = String::new();
        for (key, value) in step_results {
            results_block.push_str(&format!("{key}: {value}\n"));
        }

        let prompt = format!(
            "Original task: {task}\n\n\
             Results from executed steps:\n{results_block}\n\
             Synthesize these results into a comprehensive answer to the original task. \
             Be clear and concise."
        );

        let request = CompletionRequest::builder(&self.config.model)
            .add_message(Message::user(prompt))
            .max_tokens(self.config.max_tokens)
            .build();

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| ensemble_core::Error::ProcessingFailed(format!("Synthesis failed: {e}")))?;

        Ok(response.message.text().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl Agent for PlanExecuteAgent {
    async fn execute(&self, task: String, _context: &mut Context) -> Result<AgentResponse> {
        info!("Starting plan-execute run: {}", task);

        let mut reasoning: Vec<String> = Vec::new();
        let mut actions: Vec<String> = Vec::new();

        // Phase 1: planning
        reasoning.push("Planning phase started".to_string());
        let mut plan = match self.create_plan(&task).await {
            Ok(plan) => plan,
            Err(e) => {
                return Ok(AgentResponse::failed(
                    format!("Failed to create initial plan: {e}"),
                    reasoning,
                    actions,
                ));
            }
        };

        actions.push(format!("Created plan with {} steps", plan.steps.len()));
        reasoning.push(format!("Created plan: {}", plan.goal));

        info!("Plan created: {}", plan.goal);
        for (i, step) in plan.steps.iter().enumerate() {
            info!("  {}. {}", i + 1, step);
        }

        // Phase 2: execution loop with bounded replanning
        let mut step_results: Vec<(String, String)> = Vec::new();
        let mut replans = 0;

        while !plan.is_complete() && replans <= self.config.max_replans {
            let Some(step_idx) = plan.next_step() else {
                break;
            };
            let step = plan.steps[step_idx].clone();

            info!(
                "Executing step {}/{}: {}",
                step_idx + 1,
                plan.steps.len(),
                step
            );
            reasoning.push(format!("Executing step {}: {}", step_idx + 1, step));

            match self.execute_step(&step, &step_results).await {
                Ok(result) => {
                    plan.mark_done(step_idx);
                    step_results.push((format!("step_{step_idx}"), result));
                    actions.push(format!("Completed: {step}"));
                    reasoning.push(format!("Step {} completed successfully", step_idx + 1));
                }
                Err(error) => {
                    warn!("Step {} failed: {}", step_idx + 1, error);
                    reasoning.push(format!("Step {} failed: {}", step_idx + 1, error));

                    if replans < self.config.max_replans {
                        info!(
                            "Replanning (attempt {}/{})",
                            replans + 1,
                            self.config.max_replans
                        );
                        reasoning.push("Attempting to replan".to_string());

                        match self.replan(&plan, step_idx, &error).await {
                            Ok(new_plan) => {
                                plan = new_plan;
                                replans += 1;
                                actions.push(format!("Replanned (attempt {replans})"));
                                reasoning.push("Successfully replanned".to_string());
                            }
                            Err(e) => {
                                return Ok(AgentResponse::failed(
                                    format!("Failed to replan after step failure: {step} ({e})"),
                                    reasoning,
                                    actions,
                                ));
                            }
                        }
                    } else {
                        return Ok(AgentResponse::failed(
                            format!("Max replanning attempts reached. Failed at: {step}"),
                            reasoning,
                            actions,
                        ));
                    }
                }
            }
        }

        // Phase 3: synthesis
        if plan.is_complete() {
            reasoning.push("All steps completed, synthesizing final result".to_string());
            let final_result = self.synthesize(&task, &step_results).await?;

            info!("Plan-execute run completed successfully");

            Ok(AgentResponse::succeeded(final_result, reasoning, actions))
        } else {
            Ok(AgentResponse::failed(
                "Plan execution incomplete",
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
    use ensemble_llm::{
        CompletionResponse, ContentBlock, MessageContent, Role, StopReason, TokenUsage,
    };
    use std::sync::Mutex;

    /// Provider replaying responses strictly in order (runs are sequential)
    struct ScriptedProvider {
        responses: Mutex<Vec<CompletionResponse>>,
    }

    impl ScriptedProvider {
        fn new(mut responses: Vec<CompletionResponse>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> ensemble_llm::Result<CompletionResponse> {
            self.responses
                .lock()
                .expect("script lock poisoned")
                .pop()
                .ok_or_else(|| {
                    ensemble_llm::LlmError::RequestFailed("script exhausted".to_string())
                })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn text(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 1,
                output_tokens: 1,
            },
        }
    }

    fn tool_use() -> CompletionResponse {
        CompletionResponse {
            message: Message {
                role: Role::Assistant,
                content: Some(MessageContent::Blocks(vec![ContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "nonexistent_tool".to_string(),
                    input: serde_json::json!({}),
                }])),
            },
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage {
                input_tokens: 1,
                output_tokens: 1,
            },
        }
    }

    fn config(max_replans: usize, max_step_attempts: usize) -> PlanExecuteConfig {
        PlanExecuteConfig {
            max_replans,
            max_step_attempts,
            structured_retries: 1,
            ..PlanExecuteConfig::default()
        }
    }

    #[tokio::test]
    async fn test_plan_execute_happy_path() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            // planning
            text(r#"{"goal": "answer the question", "steps": ["research", "summarize"]}"#),
            // step 1 and step 2 execution
            text("research done"),
            text("summary done"),
            // synthesis
            text("final answer"),
        ]));

        let agent = PlanExecuteAgent::new(
            provider,
            Arc::new(ToolRegistry::new()),
            config(15, 5),
            "planner",
        );

        let mut ctx = Context::new();
        let response = agent.execute("question".to_string(), &mut ctx).await.unwrap();

        assert!(response.success, "unexpected failure: {:?}", response.error);
        assert_eq!(response.result.as_deref(), Some("final answer"));
        assert!(response.actions_taken.contains(&"Created plan with 2 steps".to_string()));
        assert!(response.actions_taken.contains(&"Completed: research".to_string()));
        assert!(response.actions_taken.contains(&"Completed: summarize".to_string()));
    }

    #[tokio::test]
    async fn test_step_failure_triggers_replan() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            // planning
            text(r#"{"goal": "do the thing", "steps": ["broken step"]}"#),
            // step execution: keeps demanding a tool until the budget dies
            tool_use(),
            // replanning
            text(r#"{"goal": "do the thing", "steps": ["fixed step"]}"#),
            // retry execution
            text("fixed result"),
            // synthesis
            text("recovered answer"),
        ]));

        let agent = PlanExecuteAgent::new(
            provider,
            Arc::new(ToolRegistry::new()),
            config(15, 1),
            "planner",
        );

        let mut ctx = Context::new();
        let response = agent.execute("thing".to_string(), &mut ctx).await.unwrap();

        assert!(response.success, "unexpected failure: {:?}", response.error);
        assert_eq!(response.result.as_deref(), Some("recovered answer"));
        assert!(response.actions_taken.contains(&"Replanned (attempt 1)".to_string()));
        assert!(response.reasoning.contains("Attempting to replan"));
    }

    #[tokio::test]
    async fn test_replan_budget_exhaustion_fails_run() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text(r#"{"goal": "doomed", "steps": ["impossible step"]}"#),
            tool_use(),
        ]));

        // Zero replans allowed
        let agent = PlanExecuteAgent::new(
            provider,
            Arc::new(ToolRegistry::new()),
            config(0, 1),
            "planner",
        );

        let mut ctx = Context::new();
        let response = agent.execute("doomed".to_string(), &mut ctx).await.unwrap();

        assert!(!response.success);
        assert!(
            response
                .error
                .unwrap_or_default()
                .contains("Max replanning attempts reached")
        );
    }

    #[tokio::test]
    async fn test_unparseable_plan_fails_run() {
        let provider = Arc::new(ScriptedProvider::new(vec![text(
            "I would rather chat than plan",
        )]));

        let agent = PlanExecuteAgent::new(
            provider,
            Arc::new(ToolRegistry::new()),
            config(15, 5),
            "planner",
        );

        let mut ctx = Context::new();
        let response = agent.execute("task".to_string(), &mut ctx).await.unwrap();

        assert!(!response.success);
        assert!(
            response
                .error
                .unwrap_or_default()
                .contains("Failed to create initial plan")
        );
    }

    #[test]
    fn test_default_config() {
        let config = PlanExecuteConfig::default();
        assert_eq!(config.max_replans, 15);
        assert_eq!(config.max_step_attempts, 5);
        assert_eq!(config.model, "gpt-4.1-nano");
    }
}
