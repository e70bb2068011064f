//! Workflow orchestration for ensemble
//!
//! This crate contains the workflow orchestrator: a small in-process engine
//! that walks a directed graph of typed nodes (start/task/condition/
//! parallel/end) against an LLM provider and a tool registry, threading a
//! shared variable map between steps. It also provides the plan-execute
//! agent, which decomposes a task into steps up front and replans on
//! failure a bounded number of times.

pub mod error;
pub mod node;
pub mod outputs;
pub mod plan;
pub mod plan_execute;
pub mod state;
pub mod workflow_agent;

pub use error::WorkflowError;
pub use node::{NodeKind, WorkflowDefinition, WorkflowGraph, WorkflowNode};
pub use outputs::{ConditionOutput, TaskOutput};
pub use plan::{Plan, PlanSpec};
pub use plan_execute::{PlanExecuteAgent, PlanExecuteConfig};
pub use state::WorkflowState;
pub use workflow_agent::{WorkflowAgent, WorkflowConfig};
