//! Pool of MCP server connections for an agent
//!
//! The pool owns one client per configured server and handles:
//! - connection lifecycle with graceful degradation
//! - tool discovery across all connected servers (filtered per agent)
//! - routing tool execution to the owning server

use crate::client::{ArcMcpClient, McpToolDefinition, McpToolResult};
use crate::config::{McpConfig, McpServerConfig};
use crate::error::McpError;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Information about an MCP tool including its source server
#[derive(Debug, Clone)]
pub struct McpToolInfo {
    pub server_name: String,
    pub definition: McpToolDefinition,
}

/// Manages multiple MCP clients for an agent
pub struct McpServerPool {
    /// Configuration
    config: Arc<McpConfig>,

    /// Active clients (server_name -> client)
    clients: RwLock<HashMap<String, ArcMcpClient>>,

    /// Agent name (for configuration lookup)
    agent_name: String,
}

impl McpServerPool {
    /// Create a new server pool
    ///
    /// # Arguments
    ///
    /// * `config` - MCP configuration
    /// * `agent_name` - Name of the agent (used for configuration lookup)
    pub fn new(config: Arc<McpConfig>, agent_name: String) -> Self {
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
            agent_name,
        }
    }

    /// Connect to every server configured for this agent
    ///
    /// Degrades gracefully: servers that fail to connect are logged and
    /// skipped, the agent runs with whatever connected.
    pub async fn initialize(&self) -> Result<()> {
        let agent_config = self
            .config
            .get_agent_config(&self.agent_name)
            .ok_or_else(|| {
                McpError::ConfigError(format!(
                    "No MCP configuration found for agent: {}",
                    self.agent_name
                ))
            })?;

        let mut clients = self.clients.write().await;
        let mut connected = 0;

        for server_name in &agent_config.mcp_servers {
            let server_config = self.config.mcp_servers.get(server_name).ok_or_else(|| {
                McpError::ConfigError(format!("MCP server not found: {server_name}"))
            })?;

            match self.connect_client(server_config, server_name).await {
                Ok(client) => {
                    info!("Connected to MCP server: {}", server_name);
                    clients.insert(server_name.clone(), client);
                    connected += 1;
                }
                Err(e) => {
                    warn!(
                        "Failed to connect to MCP server {}: {}. Continuing without it.",
                        server_name, e
                    );
                }
            }
        }

        if clients.is_empty() {
            warn!(
                "No MCP servers connected for agent: {}. Agent will run without MCP tools.",
                self.agent_name
            );
        } else {
            info!(
                "Connected to {}/{} MCP servers for agent: {}",
                connected,
                agent_config.mcp_servers.len(),
                self.agent_name
            );
        }

        Ok(())
    }

    /// Build a client for the configuration and connect it
    async fn connect_client(
        &self,
        config: &McpServerConfig,
        server_name: &str,
    ) -> Result<ArcMcpClient> {
        info!("Creating MCP client for server: {}", server_name);

        let client: ArcMcpClient = match config {
            #[cfg(feature = "stdio")]
            McpServerConfig::Stdio { .. } => {
                Arc::new(crate::client::stdio::StdioMcpClient::from_config(config)?)
            }
            #[cfg(feature = "http")]
            McpServerConfig::Http { .. } | McpServerConfig::Sse { .. } => {
                Arc::new(crate::client::http::HttpMcpClient::from_config(config)?)
            }
            #[allow(unreachable_patterns)]
            _ => {
                return Err(McpError::ConfigError(format!(
                    "Transport for server '{server_name}' is disabled at compile time"
                )));
            }
        };

        client.connect().await?;

        if !client.is_connected() {
            return Err(McpError::ConnectionFailed(format!(
                "Client for {server_name} reports not connected after connect()"
            )));
        }

        Ok(client)
    }

    /// Discover all tools from all connected servers
    ///
    /// Results carry the owning server name and are filtered by the agent's
    /// allow/deny configuration.
    pub async fn discover_tools(&self) -> Result<Vec<McpToolInfo>> {
        let clients = self.clients.read().await;
        let mut all_tools = Vec::new();

        for (server_name, client) in clients.iter() {
            match client.list_tools().await {
                Ok(tools) => {
                    info!(
                        "Discovered {} tools from server: {}",
                        tools.len(),
                        server_name
                    );
                    for tool in tools {
                        all_tools.push(McpToolInfo {
                            server_name: server_name.clone(),
                            definition: tool,
                        });
                    }
                }
                Err(e) => {
                    warn!("Failed to list tools from {}: {}", server_name, e);
                }
            }
        }

        // Filter tools based on agent configuration
        if let Some(agent_config) = self.config.get_agent_config(&self.agent_name) {
            all_tools.retain(|tool| {
                crate::config::should_include_tool(&tool.definition.name, agent_config)
            });
        }

        Ok(all_tools)
    }

    /// Call a tool on the appropriate server
    ///
    /// # Arguments
    ///
    /// * `server_name` - Name of the MCP server
    /// * `tool_name` - Name of the tool to call
    /// * `arguments` - Tool arguments as JSON
    pub async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<McpToolResult> {
        let clients = self.clients.read().await;
        let client = clients
            .get(server_name)
            .ok_or_else(|| McpError::ServerNotFound(server_name.to_string()))?;

        client.call_tool(tool_name, arguments).await
    }

    /// Get list of connected server names
    pub async fn connected_servers(&self) -> Vec<String> {
        let clients = self.clients.read().await;
        clients.keys().cloned().collect()
    }

    /// Check if any servers are connected
    pub async fn has_connections(&self) -> bool {
        let clients = self.clients.read().await;
        !clients.is_empty()
    }

    /// Disconnect from all servers
    pub async fn shutdown(&self) -> Result<()> {
        let mut clients = self.clients.write().await;

        for (server_name, client) in clients.iter() {
            info!("Disconnecting from MCP server: {}", server_name);
            if let Err(e) = client.disconnect().await {
                warn!("Error disconnecting from {}: {}", server_name, e);
            }
        }

        clients.clear();
        info!("All MCP servers disconnected");
        Ok(())
    }

    /// Reconnect to a specific server
    ///
    /// Useful for recovering from transient connection failures.
    pub async fn reconnect(&self, server_name: &str) -> Result<()> {
        let server_config = self
            .config
            .mcp_servers
            .get(server_name)
            .ok_or_else(|| McpError::ServerNotFound(server_name.to_string()))?;

        info!("Reconnecting to MCP server: {}", server_name);

        let client = self.connect_client(server_config, server_name).await?;

        let mut clients = self.clients.write().await;
        clients.insert(server_name.to_string(), client);

        info!("Successfully reconnected to MCP server: {}", server_name);
        Ok(())
    }

    /// Ping every connected server and report its health
    pub async fn health_check(&self) -> HashMap<String, bool> {
        let clients = self.clients.read().await;
        let mut status = HashMap::new();

        for (server_name, client) in clients.iter() {
            let alive = client.is_connected() && client.ping().await.is_ok();
            if !alive {
                warn!("Server {} is not responding", server_name);
            }
            status.insert(server_name.clone(), alive);
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentMcpConfig, ToolFilter};

    #[tokio::test]
    async fn test_pool_creation() {
        let config = Arc::new(McpConfig::default());
        let pool = McpServerPool::new(config, "test-agent".to_string());

        assert!(!pool.has_connections().await);
        assert_eq!(pool.connected_servers().await.len(), 0);
    }

    #[tokio::test]
    async fn test_initialize_without_agent_config() {
        let config = Arc::new(McpConfig::default());
        let pool = McpServerPool::new(config, "unknown-agent".to_string());

        let result = pool.initialize().await;
        assert!(matches!(result, Err(McpError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_initialize_degrades_on_unreachable_server() {
        let mut config = McpConfig::default();
        config.mcp_servers.insert(
            "broken".to_string(),
            McpServerConfig::Stdio {
                command: "/nonexistent/mcp-server".to_string(),
                args: vec![],
                env: HashMap::new(),
                cwd: None,
            },
        );
        config.agent_configurations.insert(
            "test-agent".to_string(),
            AgentMcpConfig {
                mcp_servers: vec!["broken".to_string()],
                tools: ToolFilter::default(),
            },
        );

        let pool = McpServerPool::new(Arc::new(config), "test-agent".to_string());

        // Connection fails but initialization still succeeds
        assert!(pool.initialize().await.is_ok());
        assert!(!pool.has_connections().await);
    }

    #[tokio::test]
    async fn test_call_tool_unknown_server() {
        let config = Arc::new(McpConfig::default());
        let pool = McpServerPool::new(config, "test-agent".to_string());

        let result = pool
            .call_tool("ghost", "tool", serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(McpError::ServerNotFound(_))));
    }
}
