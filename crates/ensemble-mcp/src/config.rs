//! Configuration types for MCP integration
//!
//! Supports project-level (`.mcp.json`) and user-level
//! (`~/.config/ensemble/mcp.json`) configuration files with merge support.

use crate::error::McpError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root MCP configuration
///
/// This is the top-level structure loaded from `.mcp.json` files.
///
/// # Example
///
/// ```json
/// {
///   "mcpServers": {
///     "research-tools": {
///       "transport": "http",
///       "url": "http://localhost:8002/mcp"
///     }
///   },
///   "agentConfigurations": {
///     "workflow": {
///       "mcpServers": ["research-tools"],
///       "tools": {"allow": "*"}
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct McpConfig {
    /// MCP server definitions
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,

    /// Per-agent configurations
    #[serde(default)]
    pub agent_configurations: HashMap<String, AgentMcpConfig>,
}

/// MCP server configuration
///
/// Supports stdio (spawned subprocess) and HTTP transports; SSE endpoints
/// are spoken to over the same HTTP POST path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum McpServerConfig {
    /// Stdio transport (for local subprocess MCP servers)
    Stdio {
        /// Command to execute
        command: String,

        /// Command arguments
        #[serde(default)]
        args: Vec<String>,

        /// Environment variables
        #[serde(default)]
        env: HashMap<String, String>,

        /// Working directory (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        cwd: Option<PathBuf>,
    },

    /// HTTP transport
    #[serde(rename = "http")]
    Http {
        /// Server URL
        url: String,

        /// HTTP headers
        #[serde(default)]
        headers: HashMap<String, String>,

        /// Timeout in seconds
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },

    /// SSE (Server-Sent Events) endpoint, handled via the HTTP client
    #[serde(rename = "sse")]
    Sse {
        /// Server URL
        url: String,

        /// HTTP headers
        #[serde(default)]
        headers: HashMap<String, String>,

        /// Timeout in seconds
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

/// Per-agent MCP configuration
///
/// Names the servers an agent may use and which of their tools are allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMcpConfig {
    /// MCP servers this agent can use (references keys in `mcp_servers`)
    pub mcp_servers: Vec<String>,

    /// Tool filtering configuration
    #[serde(default)]
    pub tools: ToolFilter,
}

/// Tool filtering configuration
///
/// Supports allow-listing and deny-listing of tools; deny wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFilter {
    /// Allowed tools ("*" for all, or list of tool names)
    #[serde(default = "default_allow_all")]
    pub allow: ToolPattern,

    /// Denied tools (overrides allow list)
    #[serde(default)]
    pub deny: Vec<String>,
}

impl Default for ToolFilter {
    fn default() -> Self {
        Self {
            allow: default_allow_all(),
            deny: Vec::new(),
        }
    }
}

/// Tool pattern specification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolPattern {
    /// Allow all tools (must be "*")
    All(String),

    /// Allow specific tools by name
    List(Vec<String>),
}

// Default functions for serde
fn default_timeout() -> u64 {
    30
}

fn default_allow_all() -> ToolPattern {
    ToolPattern::All("*".to_string())
}

impl McpConfig {
    /// Load configuration from a file
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ensemble_mcp::config::McpConfig;
    /// let config = McpConfig::from_file(".mcp.json")?;
    /// # Ok::<(), ensemble_mcp::error::McpError>(())
    /// ```
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, McpError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| McpError::ConfigError(format!("Failed to read config file: {e}")))?;

        let mut config: McpConfig = serde_json::from_str(&content)
            .map_err(|e| McpError::ConfigError(format!("Failed to parse config file: {e}")))?;

        // Resolve environment variables
        config.resolve_env_vars()?;

        Ok(config)
    }

    /// Load merged configuration (user + project)
    ///
    /// Loads the user-level config from `~/.config/ensemble/mcp.json` and
    /// merges the project-level `.mcp.json` over it.
    pub fn load_merged() -> Result<Self, McpError> {
        let mut config = Self::load_user_config().unwrap_or_default();

        if let Ok(project_config) = Self::load_project_config() {
            config.merge(project_config);
        }

        Ok(config)
    }

    /// Load user-level config from `~/.config/ensemble/mcp.json`
    pub fn load_user_config() -> Result<Self, McpError> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| McpError::ConfigError("HOME or USERPROFILE not set".to_string()))?;

        let path = PathBuf::from(home)
            .join(".config")
            .join("ensemble")
            .join("mcp.json");

        Self::from_file(path)
    }

    /// Load project-level config from `.mcp.json`
    pub fn load_project_config() -> Result<Self, McpError> {
        Self::from_file(".mcp.json")
    }

    /// Merge another config into this one (other's values take precedence)
    pub fn merge(&mut self, other: McpConfig) {
        self.mcp_servers.extend(other.mcp_servers);
        self.agent_configurations.extend(other.agent_configurations);
    }

    /// Get configuration for a specific agent
    ///
    /// Falls back to the "default" agent configuration when no specific one
    /// exists.
    pub fn get_agent_config(&self, agent_name: &str) -> Option<&AgentMcpConfig> {
        self.agent_configurations
            .get(agent_name)
            .or_else(|| self.agent_configurations.get("default"))
    }

    /// Resolve environment variables in configuration
    ///
    /// Supports `${VAR}` and `$VAR` syntax.
    pub fn resolve_env_vars(&mut self) -> Result<(), McpError> {
        for server_config in self.mcp_servers.values_mut() {
            match server_config {
                McpServerConfig::Stdio {
                    command,
                    args,
                    env,
                    cwd,
                } => {
                    *command = resolve_env_string(command)?;

                    for arg in args.iter_mut() {
                        *arg = resolve_env_string(arg)?;
                    }

                    for value in env.values_mut() {
                        *value = resolve_env_string(value)?;
                    }

                    if let Some(path) = cwd {
                        let path_str = path.to_string_lossy().to_string();
                        let resolved = resolve_env_string(&path_str)?;
                        *path = PathBuf::from(resolved);
                    }
                }
                McpServerConfig::Http {
                    url,
                    headers,
                    timeout_secs: _,
                }
                | McpServerConfig::Sse {
                    url,
                    headers,
                    timeout_secs: _,
                } => {
                    *url = resolve_env_string(url)?;

                    for value in headers.values_mut() {
                        *value = resolve_env_string(value)?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Resolve environment variable references in strings
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn resolve_env_string(s: &str) -> Result<String, McpError> {
    let mut result = s.to_string();

    // Pattern for ${VAR} syntax
    let re_braces = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| McpError::InvalidPattern(e.to_string()))?;

    for cap in re_braces.captures_iter(s) {
        let var_name = &cap[1];
        let value =
            std::env::var(var_name).map_err(|_| McpError::EnvVarNotFound(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    // Pattern for $VAR syntax (without braces)
    let re_simple = regex::Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)")
        .map_err(|e| McpError::InvalidPattern(e.to_string()))?;

    for cap in re_simple.captures_iter(&result.clone()) {
        let var_name = &cap[1];
        let value =
            std::env::var(var_name).map_err(|_| McpError::EnvVarNotFound(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    Ok(result)
}

/// Check if a tool should be included based on allow/deny rules
///
/// Deny list takes precedence over allow list.
pub fn should_include_tool(tool_name: &str, config: &AgentMcpConfig) -> bool {
    if config.tools.deny.iter().any(|d| d == tool_name) {
        return false;
    }

    match &config.tools.allow {
        ToolPattern::All(pattern) => pattern == "*",
        ToolPattern::List(allowed) => allowed.iter().any(|a| a == tool_name),
    }
}
