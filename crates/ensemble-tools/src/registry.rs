//! Tool registry for managing available tools

use crate::Tool;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry for managing tools
///
/// Uses interior mutability so a shared `Arc<ToolRegistry>` can be extended
/// (e.g. with tools discovered from MCP servers) after construction.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }
}

impl ToolRegistry {
    /// Create a new tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        tools.get(name).cloned()
    }

    /// List all registered tools
    ///
    /// Returns every tool in the registry; the executor uses this to build
    /// the tool definitions advertised to the LLM.
    pub fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        tools.values().cloned().collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        async fn execute(&self, params: Value) -> ensemble_core::Result<Value> {
            Ok(params)
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its input"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_through_registry() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let tool = registry.get("echo").unwrap();
        let result = tool.execute(json!({"hello": "world"})).await.unwrap();
        assert_eq!(result, json!({"hello": "world"}));
    }
}
