//! Tool trait definition

use async_trait::async_trait;
use ensemble_core::Result;
use serde_json::Value;

/// Trait for tools that agents can execute
///
/// Tools are functions that LLM agents can call to interact with the world.
/// Each tool provides a name, a description, and a JSON Schema describing
/// its input. The name must be unique within a [`crate::ToolRegistry`] and
/// match the name advertised to the LLM.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with given parameters
    ///
    /// # Arguments
    ///
    /// * `params` - Tool input as JSON value (should match `input_schema`)
    ///
    /// # Returns
    ///
    /// Tool output as JSON value
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Get the tool's name
    fn name(&self) -> &str;

    /// Get the tool's description
    ///
    /// This description helps the LLM understand when to use this tool
    fn description(&self) -> &str;

    /// Get the tool's input schema (JSON Schema format)
    ///
    /// # Example
    ///
    /// ```
    /// use serde_json::json;
    ///
    /// // Example schema for a web search tool:
    /// let schema = json!({
    ///     "type": "object",
    ///     "properties": {
    ///         "query": { "type": "string" },
    ///         "max_results": { "type": "integer" }
    ///     },
    ///     "required": ["query"]
    /// });
    /// ```
    fn input_schema(&self) -> Value;
}
