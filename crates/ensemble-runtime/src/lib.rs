//! Agent runtime for ensemble
//!
//! This crate hosts the agent loop (`AgentExecutor`), the ReAct agent built
//! on top of it, and the `AgentRuntime` dependency-injection container that
//! wires providers, tool registries, and MCP servers together.

pub mod agents;
pub mod executor;
pub mod runtime;

pub use agents::ReactAgent;
pub use executor::{AgentExecutor, AgentExecutorBuilder, ExecutionOutcome, ExecutorConfig, ToolInvocation};
pub use runtime::{AgentRuntime, AgentRuntimeBuilder, RuntimeConfig};
