//! Tool framework for ensemble
//!
//! Tools are named functions with a JSON Schema input contract that LLM
//! agents can invoke. This crate defines the `Tool` trait and the
//! `ToolRegistry` used by the executor to look tools up at call time.

pub mod registry;
pub mod tool;

pub use registry::ToolRegistry;
pub use tool::Tool;
