//! LLM provider abstraction layer for ensemble
//!
//! This crate provides provider-agnostic abstractions for interacting with
//! Large Language Models (LLMs). It includes:
//!
//! - Message types for LLM communication (text + tool use)
//! - Completion request/response types
//! - Tool definitions for function calling
//! - Provider trait for LLM implementations
//! - Structured-JSON extraction for agents that expect typed replies
//! - Concrete provider implementations (behind feature flags)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod structured;
pub mod tools;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LlmError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use provider::LlmProvider;
pub use structured::{extract_json, parse_structured, request_structured};
pub use tools::ToolDefinition;

// Provider implementations (feature-gated)
#[cfg(any(feature = "anthropic", feature = "openai"))]
pub mod providers;
