//! HTTP transport MCP client
//!
//! Speaks JSON-RPC 2.0 to a remote MCP server over HTTP POST requests
//! (streamable-HTTP style endpoints accept the same envelope).

use super::*;
use crate::config::McpServerConfig;
use crate::retry::RetryPolicy;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// MCP client using HTTP transport
pub struct HttpMcpClient {
    url: String,
    headers: HashMap<String, String>,

    /// HTTP client
    http_client: reqwest::Client,

    /// Server info from initialization
    server_info: Arc<Mutex<Option<ServerInfo>>>,

    /// Connection state
    connected: AtomicBool,

    /// Request ID counter
    request_id: AtomicU64,

    /// Retry policy for connection attempts
    retry_policy: RetryPolicy,
}

impl HttpMcpClient {
    /// Create a new HTTP MCP client
    ///
    /// # Arguments
    ///
    /// * `url` - Server URL
    /// * `headers` - Extra HTTP headers
    /// * `timeout` - Request timeout
    pub fn new(url: String, headers: HashMap<String, String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| McpError::ConnectionFailed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            url,
            headers,
            http_client,
            server_info: Arc::new(Mutex::new(None)),
            connected: AtomicBool::new(false),
            request_id: AtomicU64::new(0),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy used for connection attempts
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Create from an HTTP or SSE server configuration
    pub fn from_config(config: &McpServerConfig) -> Result<Self> {
        match config {
            McpServerConfig::Http {
                url,
                headers,
                timeout_secs,
            }
            | McpServerConfig::Sse {
                url,
                headers,
                timeout_secs,
            } => Self::new(
                url.clone(),
                headers.clone(),
                Duration::from_secs(*timeout_secs),
            ),
            McpServerConfig::Stdio { .. } => Err(McpError::ConfigError(
                "Expected HTTP/SSE transport config".to_string(),
            )),
        }
    }

    /// Build HTTP headers
    fn build_headers(&self) -> Result<HeaderMap> {
        let mut header_map = HeaderMap::new();
        header_map.insert("Content-Type", HeaderValue::from_static("application/json"));

        for (key, value) in &self.headers {
            let name = HeaderName::from_str(key)
                .map_err(|e| McpError::ConfigError(format!("Invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                McpError::ConfigError(format!("Invalid header value '{value}': {e}"))
            })?;
            header_map.insert(name, value);
        }

        Ok(header_map)
    }

    /// Send a JSON-RPC request over HTTP
    async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst) + 1;

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        debug!("Sending HTTP request to {}: {}", self.url, method);

        let response = self
            .http_client
            .post(&self.url)
            .headers(self.build_headers()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| McpError::ConnectionFailed(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(McpError::RequestFailed(format!(
                "HTTP {} for {}: {}",
                response.status(),
                method,
                response.text().await.unwrap_or_default()
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| McpError::RequestFailed(format!("Failed to parse response: {e}")))?;

        debug!("Received response for: {}", method);

        unwrap_jsonrpc(method, envelope)
    }

    /// Send the initialize handshake
    async fn initialize(&self) -> Result<ServerInfo> {
        let result = self.send_request("initialize", initialize_params()).await?;
        let server_info = ServerInfo::from_initialize_result(&result);

        info!(
            "Connected to MCP server: {} v{}",
            server_info.name, server_info.version
        );

        // Send initialized notification (fire and forget)
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });

        let headers = self.build_headers()?;
        let _ = self
            .http_client
            .post(&self.url)
            .headers(headers)
            .json(&notification)
            .send()
            .await;

        Ok(server_info)
    }
}

#[async_trait]
impl McpClient for HttpMcpClient {
    async fn connect(&self) -> Result<()> {
        debug!("Connecting to MCP server: {}", self.url);

        // Handshake with retry
        let url = self.url.clone();
        let server_info = self
            .retry_policy
            .execute(&format!("connect to {url}"), || async {
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
