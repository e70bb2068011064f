//! Core Agent trait definition

use crate::{AgentResponse, Context, Result};
use async_trait::async_trait;

/// Core trait that all agents implement
///
/// An agent takes a natural-language task plus an execution [`Context`]
/// (seed variables, run settings) and produces an [`AgentResponse`]. The
/// task/result types are intentionally kept as String for maximum
/// flexibility; concrete implementations parse/format as needed.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Execute a task and report the outcome
    ///
    /// The context is mutable: agents may record variables produced during
    /// the run (workflow agents thread their variable map through it).
    async fn execute(&self, task: String, context: &mut Context) -> Result<AgentResponse>;

    /// Get the agent's name
    fn name(&self) -> &str;

    /// Initialize the agent (optional)
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Shutdown the agent (optional)
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
