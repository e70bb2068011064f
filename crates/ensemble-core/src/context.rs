//! Execution context for agents
//!
//! The `Context` struct is a flexible key-value store passed to agents
//! during execution. Workflow agents use it to seed the initial variable
//! map and to surface the final variables back to the caller.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known context keys for common configuration
pub mod keys {
    /// Session ID for tracking a run across log lines
    pub const SESSION_ID: &str = "session_id";
    /// User ID on whose behalf the run executes
    pub const USER_ID: &str = "user_id";
}

/// Context passed to agents during execution
///
/// # Example
///
/// ```
/// use ensemble_core::Context;
///
/// let ctx = Context::new()
///     .with_session_id("run-42")
///     .with_variable("ticker", serde_json::json!("ACME"));
///
/// assert_eq!(ctx.session_id(), Some("run-42"));
/// assert_eq!(ctx.get("ticker"), Some(&serde_json::json!("ACME")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Key-value storage for context data
    data: HashMap<String, serde_json::Value>,
}

impl Context {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    // =========== Builder Methods ===========

    /// Seed a variable for the run
    pub fn with_variable(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Set the session ID
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.insert(keys::SESSION_ID, serde_json::json!(session_id.into()));
        self
    }

    /// Set the user ID
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.insert(keys::USER_ID, serde_json::json!(user_id.into()));
        self
    }

    // =========== Common Accessors ===========

    /// Get the session ID
    pub fn session_id(&self) -> Option<&str> {
        self.get(keys::SESSION_ID).and_then(|v| v.as_str())
    }

    /// Get the user ID
    pub fn user_id(&self) -> Option<&str> {
        self.get(keys::USER_ID).and_then(|v| v.as_str())
    }

    // =========== Generic Key-Value Operations ===========

    /// Insert a value into the context
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Get a value from the context
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Insert a typed value into the context
    ///
    /// Serializes the value to JSON before storing.
    pub fn insert_typed<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> crate::Result<()> {
        let json_value = serde_json::to_value(value).map_err(|e| {
            crate::Error::ProcessingFailed(format!("Failed to serialize context value: {e}"))
        })?;
        self.data.insert(key.into(), json_value);
        Ok(())
    }

    /// Get a typed value from the context
    ///
    /// Deserializes the JSON value into the specified type.
    pub fn get_typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> crate::Result<Option<T>> {
        match self.data.get(key) {
            None => Ok(None),
            Some(value) => {
                let typed = serde_json::from_value(value.clone()).map_err(|e| {
                    crate::Error::ProcessingFailed(format!(
                        "Failed to deserialize context value: {e}"
                    ))
                })?;
                Ok(Some(typed))
            }
        }
    }

    /// Check if a key exists in the context
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Remove a value from the context
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.data.iter()
    }

    /// Clone the backing map (used to seed workflow variables)
    pub fn to_map(&self) -> HashMap<String, serde_json::Value> {
        self.data.clone()
    }

    /// Get the number of entries in the context
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the context is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Merge another context into this one (other values override)
    pub fn merge(&mut self, other: Context) {
        self.data.extend(other.data);
    }

    /// Merge a raw variable map into this context (map values override)
    pub fn merge_map(&mut self, map: HashMap<String, serde_json::Value>) {
        self.data.extend(map);
    }
}
