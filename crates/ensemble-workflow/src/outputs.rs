//! Structured outputs emitted by workflow nodes
//!
//! Task and condition nodes ask the LLM to reply with these JSON shapes so
//! their results and emitted variables can be threaded into the state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Output of a task node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    /// The main result of the task execution
    pub result: String,

    /// Variables to store in workflow state for subsequent nodes
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

/// Output of a condition node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionOutput {
    /// Whether the condition was met
    pub condition_met: bool,

    /// Why the condition was or wasn't met
    pub reasoning: String,

    /// Optional variables derived from the evaluation
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_output_with_variables() {
        let output: TaskOutput = serde_json::from_value(json!({
            "result": "Analyzed the data and found 3 key insights",
            "variables": {
                "insights_count": 3,
                "key_metrics": {"growth": 0.15}
            }
        }))
        .unwrap();

        assert_eq!(output.variables.len(), 2);
        assert_eq!(output.variables.get("insights_count"), Some(&json!(3)));
    }

    #[test]
    fn test_task_output_variables_default_empty() {
        let output: TaskOutput =
            serde_json::from_value(json!({"result": "done"})).unwrap();
        assert!(output.variables.is_empty());
    }

    #[test]
    fn test_condition_output() {
        let output: ConditionOutput = serde_json::from_value(json!({
            "condition_met": true,
            "reasoning": "The results contain relevant information"
        }))
        .unwrap();

        assert!(output.condition_met);
        assert!(output.variables.is_empty());
    }
}
