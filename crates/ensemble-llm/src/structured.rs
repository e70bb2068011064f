//! Structured-JSON output helpers
//!
//! Agents in this workspace ask the model to reply with a JSON object of a
//! known shape (a plan, a node output, a workflow definition). Models wrap
//! such replies in markdown fences or prose more often than not, so parsing
//! goes through [`extract_json`] first, and [`request_structured`] retries
//! the completion a bounded number of times when the reply does not decode.

use crate::{CompletionRequest, LlmError, LlmProvider, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Extract a JSON value from model output
///
/// Handles, in order:
/// 1. output wrapped in ``` or ```json fences
/// 2. output that is already a bare JSON object or array
/// 3. a JSON object embedded in surrounding prose (first `{` to last `}`)
pub fn extract_json(text: &str) -> Result<Value> {
    let trimmed = text.trim();

    // Fenced code block: take the fence body and recurse on it
    if let Some(body) = fenced_body(trimmed) {
        return extract_json(body);
    }

    // Bare JSON
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Ok(value);
        }
    }

    // JSON object embedded in prose
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            let candidate = &trimmed[start..=end];
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return Ok(value);
            }
        }
    }

    Err(LlmError::StructuredOutput(format!(
        "no JSON object found in model output: {}",
        truncate(trimmed, 200)
    )))
}

/// Parse model output into a typed value
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value = extract_json(text)?;
    serde_json::from_value(value)
        .map_err(|e| LlmError::StructuredOutput(format!("JSON did not match expected shape: {e}")))
}

/// Run a completion and decode the reply into a typed value
///
/// Retries the full completion+parse round up to `max_retries` times; the
/// request is resent unchanged, which is usually enough for a model that
/// produced malformed JSON once.
pub async fn request_structured<T: DeserializeOwned>(
    provider: &dyn LlmProvider,
    request: &CompletionRequest,
    max_retries: u32,
) -> Result<T> {
    let mut last_error = None;

    for attempt in 1..=max_retries.max(1) {
        let response = provider.complete(request.clone()).await?;
        let text = response.message.text().unwrap_or_default();

        match parse_structured::<T>(text) {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Structured output decoded after {} attempts", attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    "Structured output attempt {}/{} failed: {}",
                    attempt,
                    max_retries.max(1),
                    e
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| LlmError::StructuredOutput("no attempts were made".to_string())))
}

fn fenced_body(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    // Skip an optional language tag on the opening fence line
    let body_start = rest.find('\n')?;
    let body = &rest[body_start + 1..];
    let body_end = body.rfind("```")?;
    Some(body[..body_end].trim())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
