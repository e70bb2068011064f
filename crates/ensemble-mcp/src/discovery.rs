//! Tool discovery and registration
//!
//! Discovers tools from connected MCP servers and registers them into an
//! `ensemble_tools::ToolRegistry` so the executor can call them like any
//! local tool.

use ensemble_tools::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, info};

use crate::Result;
use crate::config::AgentMcpConfig;
use crate::pool::McpServerPool;
use crate::tool::McpTool;

/// Discover MCP tools and register them into a ToolRegistry
///
/// 1. Discovers all available tools from connected MCP servers
/// 2. Filters tools based on agent configuration (allow/deny lists)
/// 3. Wraps each tool as an [`McpTool`] and registers it
///
/// # Returns
///
/// Number of tools successfully registered
pub async fn register_mcp_tools(
    pool: Arc<McpServerPool>,
    registry: &ToolRegistry,
    agent_config: &AgentMcpConfig,
) -> Result<usize> {
    info!("Discovering MCP tools for agent configuration");

    // Discovery already filters by agent config; the pool owns that logic
    let tools = pool.discover_tools().await?;

    debug!("Found {} tools from MCP servers", tools.len());

    let mut registered = 0;

    for tool_info in tools {
        let tool_name = tool_info.definition.name.clone();

        // Double-check filtering here as well, in case the registry is
        // shared between agents with different configs
        if !crate::config::should_include_tool(&tool_name, agent_config) {
            debug!("Skipping tool '{}' (filtered by config)", tool_name);
            continue;
        }

        let server_name = tool_info.server_name.clone();
        registry.register(Arc::new(McpTool::new(tool_info, pool.clone())));
        registered += 1;

        debug!("Registered MCP tool '{}' from server '{}'", tool_name, server_name);
    }

    info!("Registered {} MCP tools into registry", registered);

    Ok(registered)
}

/// Discover tool names without registering them
///
/// Useful for inspecting what is available without touching a registry.
pub async fn list_available_tools(pool: Arc<McpServerPool>) -> Result<Vec<String>> {
    let tools = pool.discover_tools().await?;
    Ok(tools.into_iter().map(|t| t.definition.name).collect())
}
