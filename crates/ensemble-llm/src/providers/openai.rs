//! OpenAI-compatible provider implementation
//!
//! Implements the LlmProvider trait against the Chat Completions API.
//! See: https://platform.openai.com/docs/api-reference/chat
//!
//! The `api_base` is configurable so the same provider works against
//! OpenAI-compatible gateways (LiteLLM proxies, vLLM, LM Studio, Azure
//! OpenAI deployments).
//!
//! # Example
//!
//! ```no_run
//! use ensemble_llm::{CompletionRequest, Message, LlmProvider};
//! use ensemble_llm::providers::{OpenAiConfig, OpenAiProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Point at a local LiteLLM proxy
//!     let config = OpenAiConfig::new("dummy-key").with_api_base("http://localhost:4000");
//!     let provider = OpenAiProvider::with_config(config)?;
//!
//!     let request = CompletionRequest::builder("gpt-4.1-nano")
//!         .add_message(Message::user("Hello!"))
//!         .max_tokens(100)
//!         .build();
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.message.text().unwrap_or_default());
//!     Ok(())
//! }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmProvider, Message, MessageContent,
    Result, Role, StopReason, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the API (default: "https://api.openai.com/v1")
    pub api_base: String,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create config from environment
    ///
    /// Reads the API key from `OPENAI_API_KEY`; `OPENAI_API_BASE` overrides
    /// the endpoint when set (e.g. a LiteLLM proxy URL).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            crate::LlmError::ConfigurationError(
                "OPENAI_API_KEY environment variable not set".to_string(),
            )
        })?;

        let api_base =
            std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| DEFAULT_OPENAI_API_BASE.to_string());

        Ok(Self {
            api_key,
            api_base,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Set a custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// OpenAI-compatible Chat Completions provider
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create a new provider with custom configuration
    pub fn with_config(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a new provider with an API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAiConfig::new(api_key))
    }

    /// Create a provider from environment variables
    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAiConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to Chat Completions API at {}", self.config.api_base);

        // Convert messages (system prompt goes into the messages array)
        let wire_messages = build_wire_messages(request.system.clone(), request.messages);

        // Convert tools if present
        let wire_tools = request.tools.as_ref().map(|tools| convert_tools(tools));

        let wire_request = WireRequest {
            model: request.model.clone(),
            messages: wire_messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: wire_tools,
            stop: request.stop_sequences,
        };

        // Send request
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&wire_request)
            .send()
            .await?;

        // Handle errors
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 => crate::LlmError::AuthenticationFailed,
                429 => crate::LlmError::RateLimitExceeded(error_text),
                400 => crate::LlmError::InvalidRequest(error_text),
                404 => crate::LlmError::ModelNotFound(request.model),
                _ => crate::LlmError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        // Parse response
        let wire_response: WireResponse = response.json().await.map_err(|e| {
            crate::LlmError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        // The API can return multiple choices but we use the first
        let choice = wire_response.choices.into_iter().next().ok_or_else(|| {
            crate::LlmError::UnexpectedResponse("No choices in response".to_string())
        })?;

        debug!(
            "Received response - finish_reason: {}, tokens: {}/{}",
            choice.finish_reason,
            wire_response.usage.prompt_tokens,
            wire_response.usage.completion_tokens
        );

        let message = parse_wire_message(choice.message)?;
        let stop_reason = map_finish_reason(&choice.finish_reason);

        Ok(CompletionResponse {
            message,
            stop_reason,
            usage: TokenUsage {
                input_tokens: wire_response.usage.prompt_tokens,
                output_tokens: wire_response.usage.completion_tokens,
            },
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ============================================================================
// Wire request types
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

// ============================================================================
// Wire response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: String,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireResponseFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireResponseFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

// ============================================================================
// Conversion functions
// ============================================================================

/// Build wire messages from our neutral format
///
/// Key difference from Anthropic: the system prompt becomes the first entry
/// of the messages array.
fn build_wire_messages(system: Option<String>, messages: Vec<Message>) -> Vec<WireMessage> {
    let mut result = Vec::new();

    if let Some(sys) = system {
        result.push(WireMessage {
            role: "system".to_string(),
            content: Some(sys),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    for msg in messages {
        result.extend(convert_message(msg));
    }

    result
}

/// Convert a single message to wire format
///
/// May produce multiple wire messages: each tool result becomes its own
/// `role:"tool"` message.
fn convert_message(msg: Message) -> Vec<WireMessage> {
    let role = match msg.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    };

    match msg.content {
        Some(MessageContent::Text(text)) => {
            vec![WireMessage {
                role: role.to_string(),
                content: Some(text),
                tool_calls: None,
                tool_call_id: None,
            }]
        }
        Some(MessageContent::Blocks(blocks)) => convert_blocks(role, blocks),
        None => {
            vec![WireMessage {
                role: role.to_string(),
                content: Some(String::new()),
                tool_calls: None,
                tool_call_id: None,
            }]
        }
    }
}

/// Convert content blocks to wire messages
fn convert_blocks(role: &str, blocks: Vec<ContentBlock>) -> Vec<WireMessage> {
    let mut messages = Vec::new();
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => {
                text_parts.push(text);
            }
            ContentBlock::ToolUse { id, name, input } => {
                // Tool uses go in the tool_calls array with stringified args
                let arguments = serde_json::to_string(&input).unwrap_or_default();
                tool_calls.push(WireToolCall {
                    id,
                    tool_type: "function".to_string(),
                    function: WireFunctionCall { name, arguments },
                });
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => {
                // Tool results become separate messages with role="tool"
                messages.push(WireMessage {
                    role: "tool".to_string(),
                    content: Some(content),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id),
                });
            }
        }
    }

    // Build the main message if we have text or tool calls
    if !text_parts.is_empty() || !tool_calls.is_empty() {
        let content = if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join("\n"))
        };

        messages.insert(
            0,
            WireMessage {
                role: role.to_string(),
                content,
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
                tool_call_id: None,
            },
        );
    }

    messages
}

/// Convert tool definitions to wire format
fn convert_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
    tools
        .iter()
        .map(|tool| WireTool {
            tool_type: "function".to_string(),
            function: WireFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        })
        .collect()
}

/// Parse a wire response message into our neutral format
fn parse_wire_message(msg: WireResponseMessage) -> Result<Message> {
    let mut blocks = Vec::new();

    if let Some(content) = msg.content {
        if !content.is_empty() {
            blocks.push(ContentBlock::Text { text: content });
        }
    }

    if let Some(tool_calls) = msg.tool_calls {
        for call in tool_calls {
            // Arguments come as a JSON string and must parse
            let input: serde_json::Value =
                serde_json::from_str(&call.function.arguments).map_err(|e| {
                    crate::LlmError::UnexpectedResponse(format!(
                        "Failed to parse tool arguments: {e}"
                    ))
                })?;

            blocks.push(ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input,
            });
        }
    }

    // If no blocks, add empty text
    if blocks.is_empty() {
        blocks.push(ContentBlock::Text {
            text: String::new(),
        });
    }

    Ok(Message {
        role: Role::Assistant,
        content: Some(MessageContent::Blocks(blocks)),
    })
}

/// Map a Chat Completions finish reason to our format
fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "stop" => StopReason::EndTurn,
        "length" => StopReason::MaxTokens,
        "tool_calls" => StopReason::ToolUse,
        _ => {
            debug!("Unknown finish reason: {}", reason);
            StopReason::EndTurn
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
