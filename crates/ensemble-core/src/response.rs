//! Agent execution results
//!
//! Every agent run produces an [`AgentResponse`] describing what happened:
//! the final result, the reasoning trail, and the actions (tool calls,
//! replans, completed nodes) taken along the way.

use serde::{Deserialize, Serialize};

/// Outcome of an agent execution
///
/// Failed runs carry `success == false` and an `error` message; the
/// reasoning trail and actions taken up to the failure are preserved so
/// callers can see how far the run got.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Whether the run reached a final result
    pub success: bool,

    /// Final result text (present on success)
    pub result: Option<String>,

    /// Reasoning steps joined into a single trail
    pub reasoning: String,

    /// Actions performed during the run (tool calls, completed steps, ...)
    pub actions_taken: Vec<String>,

    /// Error description (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    /// Build a successful response
    pub fn succeeded(result: impl Into<String>, reasoning: Vec<String>, actions: Vec<String>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            reasoning: reasoning.join(" -> "),
            actions_taken: actions,
            error: None,
        }
    }

    /// Build a failed response, preserving the trail so far
    pub fn failed(error: impl Into<String>, reasoning: Vec<String>, actions: Vec<String>) -> Self {
        Self {
            success: false,
            result: None,
            reasoning: reasoning.join(" -> "),
            actions_taken: actions,
            error: Some(error.into()),
        }
    }
}
