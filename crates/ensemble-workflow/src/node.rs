//! Workflow node model and graph construction
//!
//! A workflow is a directed graph of typed nodes. Definitions arrive as
//! JSON (hand-written or LLM-generated); [`WorkflowGraph::from_definition`]
//! validates the graph before anything executes.

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Node id of the implicit entry point
pub const START_NODE: &str = "start";

/// Node id of the implicit exit; may be referenced without being declared
pub const END_NODE: &str = "end";

/// Kind of a workflow node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Entry marker
    Start,
    /// LLM-executed step with tool access
    Task,
    /// LLM-evaluated branch point (true branch first, false branch second)
    Condition,
    /// Fan-out marker for parallel sections
    Parallel,
    /// Exit marker
    End,
}

/// A node in the workflow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique identifier
    pub id: String,

    /// Node kind
    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Short descriptive name
    pub name: String,

    /// What this node does (task nodes execute this)
    #[serde(default)]
    pub description: String,

    /// Additional data for the node (e.g. `output_var` on task nodes)
    #[serde(default)]
    pub data: serde_json::Value,

    /// IDs of the nodes to run next
    #[serde(default, rename = "next")]
    pub next_nodes: Vec<String>,

    /// Condition text (condition nodes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl WorkflowNode {
    /// The `output_var` entry of the node's data, when present
    pub fn output_var(&self) -> Option<&str> {
        self.data.get("output_var").and_then(|v| v.as_str())
    }
}

/// A workflow definition as parsed from JSON
///
/// This is also the shape the dynamic-generation prompt asks the LLM to
/// emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// All nodes of the workflow
    pub nodes: Vec<WorkflowNode>,
}

impl WorkflowDefinition {
    /// Parse a definition from a JSON string
    pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
        serde_json::from_str(json).map_err(|e| WorkflowError::InvalidDefinition(e.to_string()))
    }
}

/// Validated, executable workflow graph
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    nodes: HashMap<String, WorkflowNode>,
}

impl WorkflowGraph {
    /// Build a graph from a definition, validating its structure
    ///
    /// Validation rules:
    /// - a `start` node must exist
    /// - every `next` reference must resolve (`end` is implicit)
    /// - condition nodes need at least two outgoing edges (true/false)
    pub fn from_definition(definition: WorkflowDefinition) -> Result<Self, WorkflowError> {
        let mut nodes = HashMap::new();
        for node in definition.nodes {
            nodes.insert(node.id.clone(), node);
        }

        let graph = Self { nodes };
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        if !self.nodes.contains_key(START_NODE) {
            return Err(WorkflowError::MissingStartNode);
        }

        for node in self.nodes.values() {
            for next in &node.next_nodes {
                if next != END_NODE && !self.nodes.contains_key(next) {
                    return Err(WorkflowError::UnknownNode {
                        from: node.id.clone(),
                        to: next.clone(),
                    });
                }
            }

            if node.kind == NodeKind::Condition && node.next_nodes.len() < 2 {
                return Err(WorkflowError::InvalidCondition(node.id.clone()));
            }
        }

        Ok(())
    }

    /// Look a node up by id
    pub fn get(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(id)
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Successors of a node given the condition outcomes recorded so far
    ///
    /// Condition nodes route to their first edge when the condition was
    /// met and to their second otherwise; every other node contributes all
    /// of its outgoing edges.
    pub fn successors(
        &self,
        node_id: &str,
        condition_results: &HashMap<String, serde_json::Value>,
    ) -> Vec<String> {
        let Some(node) = self.nodes.get(node_id) else {
            return Vec::new();
        };

        if node.kind == NodeKind::Condition {
            let met = condition_results
                .get(node_id)
                .and_then(|r| r.get("condition_met"))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);

            let branch = if met { 0 } else { 1 };
            return node
                .next_nodes
                .get(branch)
                .cloned()
                .into_iter()
                .collect();
        }

        node.next_nodes.clone()
    }
}

/// Remove duplicate node ids while preserving first-seen order
pub fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, kind: NodeKind, next: &[&str]) -> WorkflowNode {
        WorkflowNode {
            id: id.to_string(),
            kind,
            name: id.to_string(),
            description: String::new(),
            data: json!({}),
            next_nodes: next.iter().map(|s| (*s).to_string()).collect(),
            condition: None,
        }
    }

    #[test]
    fn test_parse_definition_from_json() {
        let json = r#"{
            "nodes": [
                {
                    "id": "start",
                    "type": "start",
                    "name": "Start",
                    "description": "Workflow start",
                    "next": ["fetch"],
                    "data": {}
                },
                {
                    "id": "fetch",
                    "type": "task",
                    "name": "Fetch data",
                    "description": "Fetch the dataset",
                    "next": ["end"],
                    "data": {"output_var": "dataset"}
                }
            ]
        }"#;

        let definition = WorkflowDefinition::from_json(json).unwrap();
        assert_eq!(definition.nodes.len(), 2);
        assert_eq!(definition.nodes[1].kind, NodeKind::Task);
        assert_eq!(definition.nodes[1].output_var(), Some("dataset"));
    }

    #[test]
    fn test_graph_requires_start() {
        let definition = WorkflowDefinition {
            nodes: vec![node("a", NodeKind::Task, &["end"])],
        };

        let result = WorkflowGraph::from_definition(definition);
        assert!(matches!(result, Err(WorkflowError::MissingStartNode)));
    }

    #[test]
    fn test_graph_rejects_dangling_edge() {
        let definition = WorkflowDefinition {
            nodes: vec![node("start", NodeKind::Start, &["ghost"])],
        };

        let result = WorkflowGraph::from_definition(definition);
        assert!(matches!(result, Err(WorkflowError::UnknownNode { .. })));
    }

    #[test]
    fn test_graph_allows_implicit_end() {
        let definition = WorkflowDefinition {
            nodes: vec![node("start", NodeKind::Start, &["end"])],
        };

        assert!(WorkflowGraph::from_definition(definition).is_ok());
    }

    #[test]
    fn test_condition_needs_two_branches() {
        let mut cond = node("check", NodeKind::Condition, &["end"]);
        cond.condition = Some("is it done?".to_string());

        let definition = WorkflowDefinition {
            nodes: vec![node("start", NodeKind::Start, &["check"]), cond],
        };

        let result = WorkflowGraph::from_definition(definition);
        assert!(matches!(result, Err(WorkflowError::InvalidCondition(_))));
    }

    #[test]
    fn test_condition_successors_follow_branch() {
        let mut cond = node("check", NodeKind::Condition, &["yes", "no"]);
        cond.condition = Some("met?".to_string());

        let definition = WorkflowDefinition {
            nodes: vec![
                node("start", NodeKind::Start, &["check"]),
                cond,
                node("yes", NodeKind::Task, &["end"]),
                node("no", NodeKind::Task, &["end"]),
            ],
        };

        let graph = WorkflowGraph::from_definition(definition).unwrap();

        let mut results = HashMap::new();
        results.insert("check".to_string(), json!({"condition_met": true}));
        assert_eq!(graph.successors("check", &results), vec!["yes".to_string()]);

        results.insert("check".to_string(), json!({"condition_met": false}));
        assert_eq!(graph.successors("check", &results), vec!["no".to_string()]);

        // Missing result defaults to the false branch
        assert_eq!(
            graph.successors("check", &HashMap::new()),
            vec!["no".to_string()]
        );
    }

    #[test]
    fn test_plain_successors() {
        let definition = WorkflowDefinition {
            nodes: vec![
                node("start", NodeKind::Start, &["a", "b"]),
                node("a", NodeKind::Task, &["end"]),
                node("b", NodeKind::Task, &["end"]),
            ],
        };

        let graph = WorkflowGraph::from_definition(definition).unwrap();
        assert_eq!(
            graph.successors("start", &HashMap::new()),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(graph.successors("missing", &HashMap::new()).is_empty());
    }

    #[test]
    fn test_dedup_preserving_order() {
        let ids = vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
            "c".to_string(),
            "b".to_string(),
        ];
        assert_eq!(
            dedup_preserving_order(ids),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
