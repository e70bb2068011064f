//! Execution state threaded through a workflow run

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current state of a workflow execution
///
/// The variable map is the data plane of the workflow: task and condition
/// nodes read it for context and merge their emitted variables back in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Frontier of nodes to execute next
    pub current_nodes: Vec<String>,

    /// Node ids that finished, in completion order
    pub completed_nodes: Vec<String>,

    /// Recorded result per node id
    pub node_results: HashMap<String, serde_json::Value>,

    /// Shared variables threaded between nodes
    pub variables: HashMap<String, serde_json::Value>,

    /// Whether the workflow reached the end
    pub is_complete: bool,
}

impl WorkflowState {
    /// Create a fresh state starting at the `start` node
    ///
    /// # Arguments
    ///
    /// * `variables` - Initial variables seeded from the caller's context
    pub fn new(variables: HashMap<String, serde_json::Value>) -> Self {
        Self {
            current_nodes: vec![crate::node::START_NODE.to_string()],
            completed_nodes: Vec::new(),
            node_results: HashMap::new(),
            variables,
            is_complete: false,
        }
    }

    /// Record a node's result and mark it completed
    pub fn record_result(&mut self, node_id: impl Into<String>, result: serde_json::Value) {
        let node_id = node_id.into();
        self.node_results.insert(node_id.clone(), result);
        self.completed_nodes.push(node_id);
    }

    /// Merge emitted variables into the shared map (new values win)
    pub fn merge_variables(&mut self, variables: HashMap<String, serde_json::Value>) {
        self.variables.extend(variables);
    }

    /// Set a single variable
    pub fn set_variable(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.variables.insert(key.into(), value);
    }
}
