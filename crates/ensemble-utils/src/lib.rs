//! Shared utilities for ensemble
//!
//! This crate provides common functionality used across the ensemble
//! workspace: tracing/logging setup and small environment helpers.

pub mod env;
pub mod logging;

pub use env::var_or;
pub use logging::init_tracing;
