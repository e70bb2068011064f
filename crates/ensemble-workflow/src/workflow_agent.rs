//! Workflow agent: walks a node graph against an LLM and tools
//!
//! Execution proceeds frontier by frontier. A frontier with one node runs
//! directly; a frontier with several runs them concurrently against a
//! snapshot of the state, merging outcomes back in frontier order so
//! variable collisions resolve deterministically. Condition nodes route to
//! their first successor when met and their second otherwise. When no
//! workflow is supplied, the agent asks the LLM to generate one.

use crate::error::WorkflowError;
use crate::node::{
    END_NODE, NodeKind, WorkflowDefinition, WorkflowGraph, WorkflowNode, dedup_preserving_order,
};
use crate::outputs::{ConditionOutput, TaskOutput};
use crate::state::WorkflowState;
use async_trait::async_trait;
use ensemble_core::{Agent, AgentResponse, Context, Result};
use ensemble_llm::{CompletionRequest, LlmProvider, Message, structured};
use ensemble_runtime::{AgentExecutor, ExecutorConfig};
use ensemble_tools::ToolRegistry;
use futures::future::join_all;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const TASK_SYSTEM_PROMPT: &str = "You are executing a workflow task. Use tools as needed. \
When the task is done, describe what was accomplished.";

const TASK_OUTPUT_SYSTEM_PROMPT: &str = "You convert completed workflow tasks into structured \
output. Reply with a single JSON object and nothing else.";

const CONDITION_SYSTEM_PROMPT: &str = "You are evaluating a workflow condition. Reply with a \
single JSON object containing the condition result and reasoning.";

/// Configuration for workflow execution
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Model to use for all workflow LLM calls
    pub model: String,

    /// Tool-loop iteration budget per task node
    pub max_tool_rounds: usize,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature
    pub temperature: Option<f32>,

    /// Attempts for structured-JSON decoding rounds
    pub structured_retries: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-nano".to_string(),
            max_tool_rounds: 3,
            max_tokens: 4096,
            temperature: Some(0.1),
            structured_retries: 3,
        }
    }
}

/// Result of executing a single node
struct NodeOutcome {
    /// Value recorded under the node's id in the state
    record: serde_json::Value,

    /// Variables to merge into the shared map
    variables: HashMap<String, serde_json::Value>,
}

impl NodeOutcome {
    fn marker(record: serde_json::Value) -> Self {
        Self {
            record,
            variables: HashMap::new(),
        }
    }
}

/// Agent executing a typed node graph with variable threading
///
/// # Example
///
/// ```no_run
/// use ensemble_workflow::{WorkflowAgent, WorkflowConfig, WorkflowDefinition};
/// use ensemble_tools::ToolRegistry;
/// use ensemble_core::{Agent, Context};
/// use std::sync::Arc;
///
/// # async fn example(provider: Arc<dyn ensemble_llm::LlmProvider>) -> ensemble_core::Result<()> {
/// let json = std::fs::read_to_string("workflow.json")
///     .map_err(|e| ensemble_core::Error::Generic(e.to_string()))?;
/// let definition = WorkflowDefinition::from_json(&json)?;
/// let agent = WorkflowAgent::from_definition(
///     provider,
///     Arc::new(ToolRegistry::new()),
///     definition,
///     WorkflowConfig::default(),
///     "researcher",
/// )?;
///
/// let mut ctx = Context::new();
/// let response = agent.execute("Summarize AI trends".to_string(), &mut ctx).await?;
/// # Ok(())
/// # }
/// ```
pub struct WorkflowAgent {
    provider: Arc<dyn LlmProvider>,
    task_executor: AgentExecutor,
    graph: Option<WorkflowGraph>,
    config: WorkflowConfig,
    name: String,
}

impl WorkflowAgent {
    /// Create an agent over a predefined workflow definition
    ///
    /// # Errors
    ///
    /// Returns an error when the definition fails graph validation.
    pub fn from_definition(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        definition: WorkflowDefinition,
        config: WorkflowConfig,
        name: impl Into<String>,
    ) -> Result<Self> {
        let graph = WorkflowGraph::from_definition(definition)?;
        Ok(Self {
            task_executor: Self::build_task_executor(provider.clone(), tools, &config),
            provider,
            graph: Some(graph),
            config,
            name: name.into(),
        })
    }

    /// Create an agent that generates its workflow from the task
    pub fn dynamic(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: WorkflowConfig,
        name: impl Into<String>,
    ) -> Self {
        Self {
            task_executor: Self::build_task_executor(provider.clone(), tools, &config),
            provider,
            graph: None,
            config,
            name: name.into(),
        }
    }

    fn build_task_executor(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: &WorkflowConfig,
    ) -> AgentExecutor {
        AgentExecutor::new(
            provider,
            tools,
            ExecutorConfig {
                max_iterations: config.max_tool_rounds,
                model: config.model.clone(),
                system_prompt: Some(TASK_SYSTEM_PROMPT.to_string()),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
        )
    }

    /// Whether this agent carries a predefined graph
    pub fn has_workflow(&self) -> bool {
        self.graph.is_some()
    }

    /// Ask the LLM to design a workflow for the task
    async fn generate_workflow(&self, task: &str) -> Result<WorkflowGraph> {
        let prompt = format!(
            r#"Create a workflow to accomplish this task: {task}

Design a workflow with nodes that represent different steps. Each node must have:
- id: unique identifier
- type: one of ["start", "task", "condition", "parallel", "end"]
- name: short descriptive name
- description: what this node does
- next: list of next node IDs
- data: any additional data needed
- condition: (condition nodes only; their first "next" entry is the true branch, the second the false branch)

The workflow must contain a node with id "start". Route finished branches to "end".

Respond in JSON format:
{{
    "nodes": [
        {{
            "id": "start",
            "type": "start",
            "name": "Start",
            "description": "Workflow start",
            "next": ["node1"],
            "data": {{}}
        }}
    ]
}}"#
        );

        let request = CompletionRequest::builder(&self.config.model)
            .add_message(Message::user(prompt))
            .max_tokens(self.config.max_tokens)
            .build();

        let definition: WorkflowDefinition = structured::request_structured(
            self.provider.as_ref(),
            &request,
            self.config.structured_retries,
        )
        .await
        .map_err(|e| {
            ensemble_core::Error::ProcessingFailed(format!("Workflow generation failed: {e}"))
        })?;

        info!("Generated workflow with {} nodes", definition.nodes.len());

        Ok(WorkflowGraph::from_definition(definition)?)
    }

    /// Execute a single node against a state snapshot
    async fn execute_node(&self, node: &WorkflowNode, state: &WorkflowState) -> Result<NodeOutcome> {
        debug!("Executing node: {} ({:?})", node.id, node.kind);

        match node.kind {
            NodeKind::Start => Ok(NodeOutcome::marker(json!({"status": "started"}))),
            NodeKind::End => Ok(NodeOutcome::marker(json!({"status": "completed"}))),
            NodeKind::Parallel => Ok(NodeOutcome::marker(json!({"status": "parallel_marker"}))),
            NodeKind::Task => self.execute_task(node, state).await,
            NodeKind::Condition => self.evaluate_condition(node, state).await,
        }
    }

    /// Run a task node through the tool loop and decode its output
    async fn execute_task(&self, node: &WorkflowNode, state: &WorkflowState) -> Result<NodeOutcome> {
        let variables_json = serde_json::to_string_pretty(&state.variables).unwrap_or_default();
        let results_json = serde_json::to_string_pretty(&state.node_results).unwrap_or_default();

        let output_var_hint = node
            .output_var()
            .map(|var| format!("\n\nStore the main result in the variable: {var}"))
            .unwrap_or_default();

        let prompt = format!(
            "Current workflow state:\n{variables_json}\nPrevious results:\n{results_json}\n\n\
             Execute this task: {}\nAdditional data: {}\n\n\
             Use available tools to complete this task.{output_var_hint}\n\n\
             You must provide:\n\
             1. A result describing what was accomplished\n\
             2. Any variables that should be stored for use by subsequent nodes",
            node.description, node.data
        );

        let outcome = self.task_executor.run(prompt).await?;

        if !outcome.completed {
            warn!("Task node '{}' exhausted its tool budget", node.id);
            return Ok(NodeOutcome::marker(json!({
                "error": "Tool loop budget exhausted",
                "status": "failed"
            })));
        }

        debug!("Task node '{}' raw outcome: {}", node.id, outcome.text);

        // Decode into result + variables; fall back to the raw text
        match self.decode_task_output(node, &outcome.text).await {
            Ok(output) => {
                let mut variables = output.variables.clone();
                for name in variables.keys() {
                    debug!("Node '{}' stored variable '{}'", node.id, name);
                }
                if let Some(var) = node.output_var() {
                    variables.insert(var.to_string(), json!(output.result.clone()));
                }

                Ok(NodeOutcome {
                    record: json!({
                        "result": output.result,
                        "status": "completed",
                        "variables": output.variables,
                    }),
                    variables,
                })
            }
            Err(e) => {
                warn!("Failed to get structured output for '{}': {}", node.id, e);
                let mut variables = HashMap::new();
                if let Some(var) = node.output_var() {
                    variables.insert(var.to_string(), json!(outcome.text.clone()));
                }

                Ok(NodeOutcome {
                    record: json!({"result": outcome.text, "status": "completed"}),
                    variables,
                })
            }
        }
    }

    /// Ask the model to restate a finished task as `TaskOutput` JSON
    async fn decode_task_output(
        &self,
        node: &WorkflowNode,
        outcome_text: &str,
    ) -> ensemble_llm::Result<TaskOutput> {
        let prompt = format!(
            "A workflow task just finished executing.\n\n\
             Task: {}\n\
             Execution outcome:\n{outcome_text}\n\n\
             Respond with a JSON object:\n\
             {{\n  \"result\": \"the main result of the task\",\n  \"variables\": {{}}\n}}\n\
             \"variables\" holds any values worth keeping for subsequent workflow nodes.",
            node.description
        );

        let request = CompletionRequest::builder(&self.config.model)
            .add_message(Message::user(prompt))
            .system(TASK_OUTPUT_SYSTEM_PROMPT)
            .max_tokens(self.config.max_tokens)
            .build();

        structured::request_structured(
            self.provider.as_ref(),
            &request,
            self.config.structured_retries,
        )
        .await
    }

    /// Evaluate a condition node
    async fn evaluate_condition(
        &self,
        node: &WorkflowNode,
        state: &WorkflowState,
    ) -> Result<NodeOutcome> {
        let condition = node.condition.as_deref().unwrap_or(&node.description);
        let variables_json = serde_json::to_string(&state.variables).unwrap_or_default();
        let results_json = serde_json::to_string(&state.node_results).unwrap_or_default();

        debug!("Evaluating condition on '{}': {}", node.id, condition);

        let prompt = format!(
            "Evaluate this condition based on the current state:\n\n\
             Condition: {condition}\n\
             Current variables: {variables_json}\n\
             Previous results: {results_json}\n\n\
             You must:\n\
             1. Determine if the condition is met (true) or not (false)\n\
             2. Provide reasoning for your decision\n\
             3. Optionally store any relevant variables based on the evaluation\n\n\
             Respond with a JSON object:\n\
             {{\"condition_met\": true, \"reasoning\": \"why\", \"variables\": {{}}}}"
        );

        let request = CompletionRequest::builder(&self.config.model)
            .add_message(Message::user(prompt.clone()))
            .system(CONDITION_SYSTEM_PROMPT)
            .max_tokens(self.config.max_tokens)
            .build();

        let output = match structured::request_structured::<ConditionOutput>(
            self.provider.as_ref(),
            &request,
            self.config.structured_retries,
        )
        .await
        {
            Ok(output) => output,
            Err(e) => {
                // Fallback: a bare true/false answer
                warn!("Failed to get structured condition output: {}", e);
                let fallback = CompletionRequest::builder(&self.config.model)
                    .add_message(Message::user(format!(
                        "{prompt}\n\nReply with exactly \"true\" or \"false\"."
                    )))
                    .max_tokens(16)
                    .build();

                let response = self.provider.complete(fallback).await.map_err(|e| {
                    ensemble_core::Error::ProcessingFailed(format!(
                        "Condition evaluation failed: {e}"
                    ))
                })?;

                let met = response
                    .message
                    .text()
                    .unwrap_or_default()
                    .trim()
                    .eq_ignore_ascii_case("true");

                ConditionOutput {
                    condition_met: met,
                    reasoning: "Fallback evaluation".to_string(),
                    variables: HashMap::new(),
                }
            }
        };

        debug!(
            "Condition '{}' met: {} ({})",
            node.id, output.condition_met, output.reasoning
        );

        Ok(NodeOutcome {
            record: json!({
                "condition_met": output.condition_met,
                "reasoning": output.reasoning,
                "status": "evaluated",
            }),
            variables: output.variables,
        })
    }

    /// Combine all node results into the final answer
    async fn synthesize(&self, task: &str, state: &WorkflowState) -> Result<String> {
        let results_json = serde_json::to_string_pretty(&state.node_results).unwrap_or_default();
        let variables_json = serde_json::to_string_pretty(&state.variables).unwrap_or_default();

        let prompt = format!(
            "Original task: {task}\n\n\
             Workflow execution results:\n{results_json}\n\n\
             Final variables state:\n{variables_json}\n\n\
             Synthesize these results into a comprehensive answer to the original task."
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
impl Agent for WorkflowAgent {
    async fn execute(&self, task: String, context: &mut Context) -> Result<AgentResponse> {
        let mut reasoning: Vec<String> = Vec::new();
        let mut actions: Vec<String> = Vec::new();

        info!("Starting workflow execution: {}", task);

        let graph = match &self.graph {
            Some(graph) => graph.clone(),
            None => {
                reasoning.push("No predefined workflow, building one dynamically".to_string());
                match self.generate_workflow(&task).await {
                    Ok(graph) => {
                        actions.push("Built dynamic workflow".to_string());
                        graph
                    }
                    Err(e) => {
                        warn!("Dynamic workflow generation failed: {}", e);
                        return Ok(AgentResponse::failed(
                            format!("Failed to build workflow: {e}"),
                            reasoning,
                            actions,
                        ));
                    }
                }
            }
        };

        let mut state = WorkflowState::new(context.to_map());

        while !state.is_complete {
            let frontier = state.current_nodes.clone();

            if frontier.is_empty() {
                reasoning.push("No more nodes to execute".to_string());
                break;
            }

            debug!(
                "Current nodes: {:?} (completed so far: {:?})",
                frontier, state.completed_nodes
            );

            // Resolve the frontier before touching any of it
            let mut nodes: Vec<&WorkflowNode> = Vec::with_capacity(frontier.len());
            for id in &frontier {
                match graph.get(id) {
                    Some(node) => nodes.push(node),
                    None => {
                        return Ok(AgentResponse::failed(
                            WorkflowError::NodeNotFound(id.clone()).to_string(),
                            reasoning,
                            actions,
                        ));
                    }
                }
            }

            if nodes.len() > 1 {
                reasoning.push(format!("Executing {} nodes in parallel", nodes.len()));
                info!("Executing {} nodes in parallel", nodes.len());

                // Nodes see the same snapshot; outcomes merge in frontier order
                let snapshot = state.clone();
                let outcomes =
                    join_all(nodes.iter().map(|node| self.execute_node(node, &snapshot))).await;

                for (node, outcome) in nodes.iter().zip(outcomes) {
                    let outcome = outcome?;
                    state.merge_variables(outcome.variables);
                    state.record_result(node.id.clone(), outcome.record);
                    actions.push(format!("Completed node: {}", node.id));
                }
            } else {
                let node = nodes[0];
                reasoning.push(format!("Executing node: {}", node.name));

                let outcome = self.execute_node(node, &state).await?;
                state.merge_variables(outcome.variables);
                state.record_result(node.id.clone(), outcome.record);
                actions.push(format!("Completed: {}", node.name));
            }

            // Next frontier: successors of everything just executed
            let mut next = Vec::new();
            for id in &frontier {
                next.extend(graph.successors(id, &state.node_results));
            }
            let next = dedup_preserving_order(next);

            debug!("Next nodes: {:?}", next);

            if next.is_empty() || next.iter().any(|id| id == END_NODE) {
                state.is_complete = true;
                info!("Reached end of workflow");
            }
            state.current_nodes = next;
        }

        reasoning.push("Workflow completed, synthesizing results".to_string());
        info!(
            "Workflow execution complete ({} nodes). Synthesizing results",
            state.completed_nodes.len()
        );

        let final_result = self.synthesize(&task, &state).await?;

        // Surface the final variables to the caller
        context.merge_map(state.variables.clone());

        Ok(AgentResponse::succeeded(final_result, reasoning, actions))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_llm::{CompletionResponse, StopReason, TokenUsage};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider that routes requests to response queues by prompt content
    ///
    /// Deterministic under concurrency: parallel node executions match on
    /// their own prompt text instead of relying on call order.
    struct RoutedProvider {
        routes: Mutex<Vec<(String, VecDeque<CompletionResponse>)>>,
    }

    impl RoutedProvider {
        fn new(routes: Vec<(&str, Vec<CompletionResponse>)>) -> Self {
            Self {
                routes: Mutex::new(
                    routes
                        .into_iter()
                        .map(|(pattern, responses)| {
                            (pattern.to_string(), responses.into_iter().collect())
                        })
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for RoutedProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> ensemble_llm::Result<CompletionResponse> {
            let prompt = request
                .messages
                .iter()
                .filter_map(Message::text)
                .collect::<Vec<_>>()
                .join("\n");

            let mut routes = self.routes.lock().expect("routes lock poisoned");
            for (pattern, responses) in routes.iter_mut() {
                if prompt.contains(pattern.as_str()) {
                    if let Some(response) = responses.pop_front() {
                        return Ok(response);
                    }
                }
            }

            Err(ensemble_llm::LlmError::RequestFailed(format!(
                "no scripted response for prompt: {}",
                prompt.chars().take(80).collect::<String>()
            )))
        }

        fn name(&self) -> &str {
            "routed"
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

    fn config() -> WorkflowConfig {
        WorkflowConfig {
            structured_retries: 1,
            ..WorkflowConfig::default()
        }
    }

    fn linear_definition() -> WorkflowDefinition {
        WorkflowDefinition::from_json(
            r#"{
                "nodes": [
                    {"id": "start", "type": "start", "name": "Start", "next": ["analyze"]},
                    {
                        "id": "analyze",
                        "type": "task",
                        "name": "Analyze data",
                        "description": "Analyze the dataset",
                        "next": ["end"],
                        "data": {"output_var": "summary"}
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_linear_workflow_threads_variables() {
        let provider = Arc::new(RoutedProvider::new(vec![
            (
                "Execute this task: Analyze the dataset",
                vec![text("Found three key insights")],
            ),
            (
                "A workflow task just finished",
                vec![text(
                    r#"{"result": "3 insights found", "variables": {"insights": 3}}"#,
                )],
            ),
            ("Synthesize these results", vec![text("Final report")]),
        ]));

        let agent = WorkflowAgent::from_definition(
            provider,
            Arc::new(ToolRegistry::new()),
            linear_definition(),
            config(),
            "wf",
        )
        .unwrap();

        let mut ctx = Context::new();
        let response = agent.execute("analyze".to_string(), &mut ctx).await.unwrap();

        assert!(response.success, "unexpected failure: {:?}", response.error);
        assert_eq!(response.result.as_deref(), Some("Final report"));
        assert!(response.actions_taken.contains(&"Completed: Analyze data".to_string()));

        // Variables emitted by the node and the output_var are surfaced
        assert_eq!(ctx.get("insights"), Some(&json!(3)));
        assert_eq!(ctx.get("summary"), Some(&json!("3 insights found")));
    }

    #[tokio::test]
    async fn test_condition_routes_true_branch() {
        let definition = WorkflowDefinition::from_json(
            r#"{
                "nodes": [
                    {"id": "start", "type": "start", "name": "Start", "next": ["check"]},
                    {
                        "id": "check",
                        "type": "condition",
                        "name": "Check quality",
                        "condition": "is the data usable?",
                        "next": ["good", "bad"]
                    },
                    {"id": "good", "type": "task", "name": "Use data", "description": "Process the usable data", "next": ["end"]},
                    {"id": "bad", "type": "task", "name": "Discard", "description": "Discard the data", "next": ["end"]}
                ]
            }"#,
        )
        .unwrap();

        let provider = Arc::new(RoutedProvider::new(vec![
            (
                "Evaluate this condition",
                vec![text(
                    r#"{"condition_met": true, "reasoning": "looks usable", "variables": {"usable": true}}"#,
                )],
            ),
            (
                "Execute this task: Process the usable data",
                vec![text("processed")],
            ),
            (
                "A workflow task just finished",
                vec![text(r#"{"result": "processed", "variables": {}}"#)],
            ),
            ("Synthesize these results", vec![text("done")]),
        ]));

        let agent = WorkflowAgent::from_definition(
            provider,
            Arc::new(ToolRegistry::new()),
            definition,
            config(),
            "wf",
        )
        .unwrap();

        let mut ctx = Context::new();
        let response = agent.execute("route".to_string(), &mut ctx).await.unwrap();

        assert!(response.success, "unexpected failure: {:?}", response.error);
        // True branch ran, false branch never executed
        assert!(response.actions_taken.contains(&"Completed: Use data".to_string()));
        assert!(!response.actions_taken.contains(&"Completed: Discard".to_string()));
        assert_eq!(ctx.get("usable"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_parallel_frontier_executes_all_nodes() {
        let definition = WorkflowDefinition::from_json(
            r#"{
                "nodes": [
                    {"id": "start", "type": "start", "name": "Start", "next": ["fetch_news", "fetch_prices"]},
                    {"id": "fetch_news", "type": "task", "name": "Fetch news", "description": "Fetch the news feed", "next": ["end"]},
                    {"id": "fetch_prices", "type": "task", "name": "Fetch prices", "description": "Fetch market prices", "next": ["end"]}
                ]
            }"#,
        )
        .unwrap();

        let provider = Arc::new(RoutedProvider::new(vec![
            ("Execute this task: Fetch the news feed", vec![text("news ok")]),
            ("Execute this task: Fetch market prices", vec![text("prices ok")]),
            (
                "A workflow task just finished",
                vec![
                    text(r#"{"result": "done", "variables": {}}"#),
                    text(r#"{"result": "done", "variables": {}}"#),
                ],
            ),
            ("Synthesize these results", vec![text("combined")]),
        ]));

        let agent = WorkflowAgent::from_definition(
            provider,
            Arc::new(ToolRegistry::new()),
            definition,
            config(),
            "wf",
        )
        .unwrap();

        let mut ctx = Context::new();
        let response = agent.execute("gather".to_string(), &mut ctx).await.unwrap();

        assert!(response.success, "unexpected failure: {:?}", response.error);
        assert!(response.actions_taken.contains(&"Completed node: fetch_news".to_string()));
        assert!(response.actions_taken.contains(&"Completed node: fetch_prices".to_string()));
        assert!(response.reasoning.contains("Executing 2 nodes in parallel"));
    }

    #[tokio::test]
    async fn test_dynamic_workflow_generation() {
        let generated = r#"{
            "nodes": [
                {"id": "start", "type": "start", "name": "Start", "description": "", "next": ["work"], "data": {}},
                {"id": "work", "type": "task", "name": "Work", "description": "Do the work", "next": ["end"], "data": {}}
            ]
        }"#;

        let provider = Arc::new(RoutedProvider::new(vec![
            ("Create a workflow to accomplish this task", vec![text(generated)]),
            ("Execute this task: Do the work", vec![text("worked")]),
            (
                "A workflow task just finished",
                vec![text(r#"{"result": "worked", "variables": {}}"#)],
            ),
            ("Synthesize these results", vec![text("all done")]),
        ]));

        let agent = WorkflowAgent::dynamic(
            provider,
            Arc::new(ToolRegistry::new()),
            config(),
            "dynamic-wf",
        );
        assert!(!agent.has_workflow());

        let mut ctx = Context::new();
        let response = agent.execute("do work".to_string(), &mut ctx).await.unwrap();

        assert!(response.success, "unexpected failure: {:?}", response.error);
        assert!(response.actions_taken.contains(&"Built dynamic workflow".to_string()));
        assert_eq!(response.result.as_deref(), Some("all done"));
    }

    #[tokio::test]
    async fn test_dynamic_generation_failure_fails_run() {
        let provider = Arc::new(RoutedProvider::new(vec![(
            "Create a workflow to accomplish this task",
            vec![text("I cannot produce a workflow right now")],
        )]));

        let agent =
            WorkflowAgent::dynamic(provider, Arc::new(ToolRegistry::new()), config(), "wf");

        let mut ctx = Context::new();
        let response = agent.execute("impossible".to_string(), &mut ctx).await.unwrap();

        assert!(!response.success);
        assert!(response.error.unwrap_or_default().contains("Failed to build workflow"));
    }

    #[tokio::test]
    async fn test_context_seeds_initial_variables() {
        let provider = Arc::new(RoutedProvider::new(vec![
            (
                "Execute this task: Analyze the dataset",
                vec![text("used the seed")],
            ),
            (
                "A workflow task just finished",
                vec![text(r#"{"result": "ok", "variables": {}}"#)],
            ),
            ("Synthesize these results", vec![text("synthesized")]),
        ]));

        let agent = WorkflowAgent::from_definition(
            provider,
            Arc::new(ToolRegistry::new()),
            linear_definition(),
            config(),
            "wf",
        )
        .unwrap();

        let mut ctx = Context::new().with_variable("dataset_url", json!("s3://bucket/data.csv"));
        let response = agent.execute("analyze".to_string(), &mut ctx).await.unwrap();

        assert!(response.success);
        // Seed variable survives the run
        assert_eq!(ctx.get("dataset_url"), Some(&json!("s3://bucket/data.csv")));
    }
}
