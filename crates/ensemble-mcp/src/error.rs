//! Error types for MCP operations

use thiserror::Error;

/// Errors that can occur during MCP operations
#[derive(Error, Debug)]
pub enum McpError {
    /// MCP connection failed
    #[error("MCP connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected to MCP server
    #[error("Not connected to MCP server")]
    NotConnected,

    /// MCP request failed
    #[error("MCP request failed: {0}")]
    RequestFailed(String),

    /// MCP tool call failed
    #[error("MCP tool call failed: {0}")]
    ToolCallFailed(String),

    /// MCP server not found
    #[error("MCP server not found: {0}")]
    ServerNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// Invalid pattern error
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Convert McpError to ensemble_core::Error
impl From<McpError> for ensemble_core::Error {
    fn from(err: McpError) -> Self {
        ensemble_core::Error::ProcessingFailed(err.to_string())
    }
}
