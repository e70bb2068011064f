//! Model Context Protocol (MCP) integration for ensemble
//!
//! This crate lets agents call tools hosted on external MCP servers:
//! - Connect via stdio (spawned subprocess) or HTTP transports
//! - Discover tools across servers and register them into a `ToolRegistry`
//! - Route tool execution back to the owning server
//! - Filter tools per agent with allow/deny lists
//!
//! # Example
//!
//! ```no_run
//! use ensemble_mcp::config::McpConfig;
//! use ensemble_mcp::pool::McpServerPool;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration
//! let config = McpConfig::load_merged()?;
//!
//! // Create a server pool for an agent
//! let pool = McpServerPool::new(Arc::new(config), "my-agent".to_string());
//!
//! // Connect to all configured MCP servers
//! pool.initialize().await?;
//!
//! // Discover tools
//! let tools = pool.discover_tools().await?;
//! println!("Discovered {} tools", tools.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod pool;
pub mod retry;
pub mod tool;

// Re-export commonly used types
pub use client::{McpClient, McpContent, McpToolDefinition, McpToolResult, ServerInfo};
pub use config::{AgentMcpConfig, McpConfig, McpServerConfig};
pub use error::McpError;
pub use pool::{McpServerPool, McpToolInfo};
pub use retry::RetryPolicy;
pub use tool::McpTool;

/// Result type for MCP operations
pub type Result<T> = std::result::Result<T, McpError>;
