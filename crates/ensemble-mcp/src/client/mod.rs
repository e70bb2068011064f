//! MCP client implementations
//!
//! The orchestrator consumes MCP servers for their tools. The trait below
//! covers the tool surface of the protocol (initialize, ping, tools/list,
//! tools/call) over either transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::Result;
use crate::error::McpError;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "stdio")]
pub mod stdio;

/// MCP protocol version spoken by the clients
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP client trait - abstracts over transports
///
/// All methods use `&self` (not `&mut self`) to enable use through `Arc`;
/// implementations use interior mutability for state changes.
#[async_trait]
pub trait McpClient: Send + Sync {
    /// Initialize the connection to the MCP server
    async fn connect(&self) -> Result<()>;

    /// Check if the client is connected
    fn is_connected(&self) -> bool;

    /// Disconnect from the server
    async fn disconnect(&self) -> Result<()>;

    /// Ping the server to verify the connection is alive
    async fn ping(&self) -> Result<()>;

    /// List available tools
    async fn list_tools(&self) -> Result<Vec<McpToolDefinition>>;

    /// Call a tool
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult>;

    /// Get server info (from the initialize response)
    async fn server_info(&self) -> Option<ServerInfo>;
}

/// MCP tool definition (from tools/list)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value, // JSON Schema
}

/// MCP tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    pub content: Vec<McpContent>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "isError")]
    pub is_error: Option<bool>,
}

impl McpToolResult {
    /// Flatten the text blocks of a result into a single string
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                McpContent::Text { text } => Some(text.as_str()),
                McpContent::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// MCP content block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// MCP server info (from initialize)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
}

impl ServerInfo {
    /// Parse server info out of an initialize result
    pub fn from_initialize_result(result: &Value) -> Self {
        Self {
            name: result["serverInfo"]["name"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
            version: result["serverInfo"]["version"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
            protocol_version: result["protocolVersion"]
                .as_str()
                .unwrap_or(PROTOCOL_VERSION)
                .to_string(),
        }
    }
}

/// Build the JSON-RPC initialize params sent by every transport
pub(crate) fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {}
        },
        "clientInfo": {
            "name": "ensemble",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// Interpret a raw JSON-RPC response envelope
///
/// Returns the `result` member, or `RequestFailed` when the envelope
/// carries an `error` member or no result at all.
pub(crate) fn unwrap_jsonrpc(method: &str, envelope: Value) -> Result<Value> {
    if let Some(error) = envelope.get("error") {
        return Err(McpError::RequestFailed(format!("{method}: {error}")));
    }

    envelope
        .get("result")
        .cloned()
        .ok_or_else(|| McpError::RequestFailed(format!("{method}: no result in response")))
}

/// Type alias for Arc-wrapped MCP client
pub type ArcMcpClient = Arc<dyn McpClient>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_text_flattening() {
        let result = McpToolResult {
            content: vec![
                McpContent::Text {
                    text: "first".to_string(),
                },
                McpContent::Image {
                    data: "base64".to_string(),
                    mime_type: "image/png".to_string(),
                },
                McpContent::Text {
                    text: "second".to_string(),
                },
            ],
            is_error: None,
        };

        assert_eq!(result.text(), "first\nsecond");
    }

    #[test]
    fn test_tool_definition_parsing() {
        let json = json!({
            "name": "web_search",
            "description": "Search the web",
            "inputSchema": {"type": "object"}
        });

        let def: McpToolDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(def.name, "web_search");
        assert_eq!(def.description.as_deref(), Some("Search the web"));
    }

    #[test]
    fn test_unwrap_jsonrpc_result() {
        let envelope = json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}});
        let result = unwrap_jsonrpc("tools/list", envelope).unwrap();
        assert_eq!(result["ok"], true);
    }

    #[test]
    fn test_unwrap_jsonrpc_error() {
        let envelope = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32600}});
        let result = unwrap_jsonrpc("tools/list", envelope);
        assert!(matches!(result, Err(McpError::RequestFailed(_))));
    }

    #[test]
    fn test_unwrap_jsonrpc_missing_result() {
        let envelope = json!({"jsonrpc": "2.0", "id": 1});
        assert!(unwrap_jsonrpc("ping", envelope).is_err());
    }

    #[test]
    fn test_server_info_from_initialize() {
        let result = json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {"name": "research-tools", "version": "1.2.0"}
        });

        let info = ServerInfo::from_initialize_result(&result);
        assert_eq!(info.name, "research-tools");
        assert_eq!(info.version, "1.2.0");
        assert_eq!(info.protocol_version, "2024-11-05");
    }

    #[test]
    fn test_server_info_defaults() {
        let info = ServerInfo::from_initialize_result(&json!({}));
        assert_eq!(info.name, "unknown");
        assert_eq!(info.protocol_version, PROTOCOL_VERSION);
    }
}
