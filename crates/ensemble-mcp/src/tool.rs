//! McpTool wrapper that implements the Tool trait

use async_trait::async_trait;
use ensemble_tools::Tool;
use serde_json::Value;
use std::sync::Arc;

use crate::pool::{McpServerPool, McpToolInfo};

/// Adapter exposing an MCP tool through `ensemble_tools::Tool`
///
/// Execution is routed through the [`McpServerPool`] to the server that
/// advertised the tool; MCP text content is flattened into the result.
pub struct McpTool {
    /// Tool information (name, schema, owning server)
    info: McpToolInfo,

    /// Pool routing execution to the right server
    pool: Arc<McpServerPool>,
}

impl McpTool {
    /// Create a new McpTool
    ///
    /// # Arguments
    ///
    /// * `info` - Tool information from the MCP server
    /// * `pool` - Pool used to route tool calls
    pub fn new(info: McpToolInfo, pool: Arc<McpServerPool>) -> Self {
        Self { info, pool }
    }

    /// Get the server name this tool belongs to
    pub fn server_name(&self) -> &str {
        &self.info.server_name
    }
}

#[async_trait]
impl Tool for McpTool {
    async fn execute(&self, params: Value) -> ensemble_core::Result<Value> {
        let result = self
            .pool
            .call_tool(&self.info.server_name, &self.info.definition.name, params)
            .await
            .map_err(|e| {
                ensemble_core::Error::ProcessingFailed(format!("MCP tool call failed: {e}"))
            })?;

        // An error result from the server is a tool failure
        if result.is_error.unwrap_or(false) {
            return Err(ensemble_core::Error::ProcessingFailed(format!(
                "MCP tool '{}' returned error: {}",
                self.info.definition.name,
                result.text()
            )));
        }

        Ok(Value::String(result.text()))
    }

    fn name(&self) -> &str {
        &self.info.definition.name
    }

    fn description(&self) -> &str {
        self.info
            .definition
            .description
            .as_deref()
            .unwrap_or("No description available")
    }

    fn input_schema(&self) -> Value {
        self.info.definition.input_schema.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::McpToolDefinition;
    use crate::config::McpConfig;

    fn tool_info(description: Option<&str>) -> McpToolInfo {
        McpToolInfo {
            server_name: "research-tools".to_string(),
            definition: McpToolDefinition {
                name: "web_search".to_string(),
                description: description.map(str::to_string),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"}
                    }
                }),
            },
        }
    }

    #[test]
    fn test_mcp_tool_metadata() {
        let pool = Arc::new(McpServerPool::new(
            Arc::new(McpConfig::default()),
            "test".to_string(),
        ));

        let tool = McpTool::new(tool_info(Some("Search the web")), pool);

        assert_eq!(tool.name(), "web_search");
        assert_eq!(tool.description(), "Search the web");
        assert_eq!(tool.server_name(), "research-tools");
        assert!(tool.input_schema().is_object());
    }

    #[test]
    fn test_mcp_tool_no_description() {
        let pool = Arc::new(McpServerPool::new(
            Arc::new(McpConfig::default()),
            "test".to_string(),
        ));

        let tool = McpTool::new(tool_info(None), pool);
        assert_eq!(tool.description(), "No description available");
    }

    #[tokio::test]
    async fn test_execute_fails_without_server() {
        let pool = Arc::new(McpServerPool::new(
            Arc::new(McpConfig::default()),
            "test".to_string(),
        ));

        let tool = McpTool::new(tool_info(None), pool);
        let result = tool.execute(serde_json::json!({"query": "x"})).await;
        assert!(result.is_err());
    }
}
