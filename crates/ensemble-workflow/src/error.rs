//! Error types for workflow construction and execution

use thiserror::Error;

/// Errors raised while building or walking a workflow graph
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The definition has no start node
    #[error("Workflow has no 'start' node")]
    MissingStartNode,

    /// An edge references a node that does not exist
    #[error("Node '{from}' references unknown node '{to}'")]
    UnknownNode {
        /// Node carrying the dangling edge
        from: String,
        /// The missing target
        to: String,
    },

    /// A condition node needs both a true and a false branch
    #[error("Condition node '{0}' must have at least two outgoing edges")]
    InvalidCondition(String),

    /// A node id appeared in the execution frontier without a definition
    #[error("Node '{0}' not found in workflow")]
    NodeNotFound(String),

    /// The workflow definition could not be parsed or generated
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),
}

/// Convert WorkflowError to ensemble_core::Error
impl From<WorkflowError> for ensemble_core::Error {
    fn from(err: WorkflowError) -> Self {
        ensemble_core::Error::ProcessingFailed(err.to_string())
    }
}
