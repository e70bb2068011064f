//! Core abstractions for ensemble
//!
//! This crate defines the fundamental traits and types used throughout the
//! ensemble workspace: the `Agent` trait, the `AgentResponse` result type,
//! the `Context` variable store, and the shared error type.

pub mod agent;
pub mod context;
pub mod error;
pub mod response;

pub use agent::Agent;
pub use context::Context;
pub use error::{Error, Result};
pub use response::AgentResponse;
