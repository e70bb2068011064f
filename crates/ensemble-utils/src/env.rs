//! Environment variable helpers

/// Read an environment variable, falling back to a default when unset or empty
pub fn var_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}
