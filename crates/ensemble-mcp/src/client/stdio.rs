//! Stdio transport MCP client
//!
//! Spawns the MCP server as a child process and speaks newline-delimited
//! JSON-RPC 2.0 over its stdin/stdout.

use super::*;
use crate::config::McpServerConfig;
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// MCP client using stdio transport
pub struct StdioMcpClient {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,

    /// Child process handle
    child: Mutex<Option<Child>>,

    /// Pipes to the child, held together so request/response pairs cannot
    /// interleave across concurrent callers
    pipes: Mutex<Option<Pipes>>,

    /// Server info from initialization
    server_info: Mutex<Option<ServerInfo>>,

    /// Connection state
    connected: AtomicBool,

    /// Request ID counter
    request_id: AtomicU64,

    /// Retry policy for the initialize handshake
    retry_policy: RetryPolicy,
}

struct Pipes {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StdioMcpClient {
    /// Create a new stdio MCP client
    ///
    /// # Arguments
    ///
    /// * `command` - Command to execute
    /// * `args` - Command arguments
    /// * `env` - Environment variables for the child
    /// * `cwd` - Working directory (optional)
    pub fn new(
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
        cwd: Option<PathBuf>,
    ) -> Self {
        Self {
            command,
            args,
            env,
            cwd,
            child: Mutex::new(None),
            pipes: Mutex::new(None),
            server_info: Mutex::new(None),
            connected: AtomicBool::new(false),
            request_id: AtomicU64::new(0),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy used for the handshake
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Create from a stdio server configuration
    pub fn from_config(config: &McpServerConfig) -> Result<Self> {
        match config {
            McpServerConfig::Stdio {
                command,
                args,
                env,
                cwd,
            } => Ok(Self::new(
                command.clone(),
                args.clone(),
                env.clone(),
                cwd.clone(),
            )),
            _ => Err(McpError::ConfigError(
                "Expected Stdio transport config".to_string(),
            )),
        }
    }

    /// Send a JSON-RPC request and read the matching response line
    async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst) + 1;

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        debug!("Sending request: {}", method);

        let mut pipes = self.pipes.lock().await;
        let pipes = pipes.as_mut().ok_or(McpError::NotConnected)?;

        let request_line = serde_json::to_string(&request)?;
        pipes
            .stdin
            .write_all(request_line.as_bytes())
            .await
            .map_err(|e| McpError::ConnectionFailed(e.to_string()))?;
        pipes
            .stdin
            .write_all(b"\n")
            .await
            .map_err(|e| McpError::ConnectionFailed(e.to_string()))?;
        pipes
            .stdin
            .flush()
            .await
            .map_err(|e| McpError::ConnectionFailed(e.to_string()))?;

        let mut line = String::new();
        pipes
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| McpError::ConnectionFailed(e.to_string()))?;

        if line.is_empty() {
            return Err(McpError::ConnectionFailed(
                "Server closed connection".to_string(),
            ));
        }

        debug!("Received response for: {}", method);

        let envelope: Value = serde_json::from_str(&line)?;
        unwrap_jsonrpc(method, envelope)
    }

    /// Send a JSON-RPC notification (no response expected)
    async fn send_notification(&self, method: &str) -> Result<()> {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method
        });

        let mut pipes = self.pipes.lock().await;
        if let Some(pipes) = pipes.as_mut() {
            let line = serde_json::to_string(&notification)?;
            let _ = pipes.stdin.write_all(line.as_bytes()).await;
            let _ = pipes.stdin.write_all(b"\n").await;
            let _ = pipes.stdin.flush().await;
        }

        Ok(())
    }

    /// Send the initialize handshake
    async fn initialize(&self) -> Result<ServerInfo> {
        let result = self.send_request("initialize", initialize_params()).await?;
        let server_info = ServerInfo::from_initialize_result(&result);

        info!(
            "Connected to MCP server: {} v{}",
            server_info.name, server_info.version
        );

        self.send_notification("notifications/initialized").await?;

        Ok(server_info)
    }
}

#[async_trait]
impl McpClient for StdioMcpClient {
    async fn connect(&self) -> Result<()> {
        debug!("Starting MCP server: {} {:?}", self.command, self.args);

        // Spawn child process
        let mut command = Command::new(&self.command);
        command.args(&self.args);
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::inherit());

        for (key, value) in &self.env {
            command.env(key, value);
        }

        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command
            .spawn()
            .map_err(|e| McpError::ConnectionFailed(format!("Failed to spawn process: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::ConnectionFailed("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::ConnectionFailed("Failed to get stdout".to_string()))?;

        *self.pipes.lock().await = Some(Pipes {
            stdin,
            stdout: BufReader::new(stdout),
        });
        *self.child.lock().await = Some(child);

        // Initialize protocol (with retry)
        let command_name = self.command.clone();
        let server_info = self
            .retry_policy
            .execute(&format!("initialize {command_name}"), || async {
                self.initialize().await
            })
            .await?;

        *self.server_info.lock().await = Some(server_info);
        self.connected.store(true, Ordering::SeqCst);

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        debug!("Disconnecting from MCP server");

        self.connected.store(false, Ordering::SeqCst);

        // Drop pipes before killing the child
        *self.pipes.lock().await = None;

        let mut child = self.child.lock().await;
        if let Some(child) = child.as_mut() {
            let _ = child.kill().await;
        }
        *child = None;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }

        self.send_request("ping", serde_json::json!({})).await?;
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<McpToolDefinition>> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }

        let result = self
            .send_request("tools/list", serde_json::json!({}))
            .await?;

        let tools: Vec<McpToolDefinition> = serde_json::from_value(result["tools"].clone())
            .map_err(|e| McpError::RequestFailed(format!("Failed to parse tools: {e}")))?;

        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });

        let result = self.send_request("tools/call", params).await?;

        let tool_result: McpToolResult = serde_json::from_value(result)
            .map_err(|e| McpError::ToolCallFailed(format!("Failed to parse result: {e}")))?;

        Ok(tool_result)
    }

    async fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.lock().await.clone()
    }
}

impl Drop for StdioMcpClient {
    fn drop(&mut self) {
        // Best effort cleanup - kill the child process
        if let Ok(mut child) = self.child.try_lock() {
            if let Some(child) = child.as_mut() {
                let _ = child.start_kill();
            }
        }
    }
}
