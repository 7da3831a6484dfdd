//! Media provider trait and response helpers
//!
//! Providers differ in how they name things. The helpers here accept the
//! known aliases for task ids, status fields, and error messages, looking
//! at the top level of a response and inside a `data` wrapper.

use crate::job::GenerationRequest;
use ember_core::{truncate_snapshot, EmberError, Result};
use serde_json::Value;
use std::fmt;

const TASK_ID_KEYS: &[&str] = &["taskId", "task_id", "id", "jobId", "job_id"];
const STATUS_KEYS: &[&str] = &["status", "state", "taskStatus", "task_status"];
const ERROR_KEYS: &[&str] = &[
    "errorMessage",
    "error_message",
    "msg",
    "message",
    "error",
    "detail",
];
const DIAGNOSTIC_LIMIT: usize = 4096;

/// Which status endpoint to query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEndpoint {
    Primary,
    /// Older endpoint, consulted only when the primary reports not-found
    Legacy,
}

impl fmt::Display for StatusEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEndpoint::Primary => write!(f, "primary"),
            StatusEndpoint::Legacy => write!(f, "legacy"),
        }
    }
}

/// A provider reply: HTTP status plus the decoded body.
///
/// Bodies that are not valid JSON are kept as a JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub http_status: u16,
    pub body: Value,
}

impl ProviderResponse {
    pub fn new(http_status: u16, body: Value) -> Self {
        Self { http_status, body }
    }

    /// Decode a raw body, falling back to a string value
    pub fn from_text(http_status: u16, text: String) -> Self {
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Self { http_status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status) && !self.is_not_found()
    }

    /// HTTP 404, or a 2xx envelope whose `code` field says 404
    pub fn is_not_found(&self) -> bool {
        self.http_status == 404 || self.body.get("code").and_then(Value::as_u64) == Some(404)
    }

    /// Compact body text for error messages
    pub fn snapshot(&self) -> String {
        let text = match &self.body {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        truncate_snapshot(&text, DIAGNOSTIC_LIMIT)
    }
}

/// Status returned by a provider health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Available,
    Unavailable(String),
    NoApiKey,
}

/// Coarse classification of a provider status string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Failure,
    Pending,
}

/// Trait implemented by each media provider
pub trait MediaProvider: Send + Sync {
    /// Provider name (e.g. "http", "mock")
    fn name(&self) -> &str;

    /// Check if the provider is usable (API key set)
    fn health_check(&self) -> ProviderStatus;

    /// Submit a generation request and return the provider's task id
    fn submit(&self, request: &GenerationRequest) -> Result<String>;

    /// Query a status endpoint. Non-2xx replies are returned, not raised.
    fn status(&self, task_id: &str, endpoint: StatusEndpoint) -> Result<ProviderResponse>;
}

/// Turn a submit reply into a task id, or `SubmitFailed` with the raw body
pub fn parse_submit_response(response: &ProviderResponse) -> Result<String> {
    if !(200..300).contains(&response.http_status) {
        let reason = extract_error_message(&response.body)
            .map(|m| format!("HTTP {}: {}", response.http_status, m))
            .unwrap_or_else(|| format!("HTTP {}", response.http_status));
        return Err(EmberError::SubmitFailed {
            reason,
            body: response.snapshot(),
        });
    }

    extract_task_id(&response.body).ok_or_else(|| EmberError::SubmitFailed {
        reason: format!("missing task id (looked for {})", TASK_ID_KEYS.join(", ")),
        body: response.snapshot(),
    })
}

/// Find a task id at the top level or under `data`
pub fn extract_task_id(body: &Value) -> Option<String> {
    lookup(body, TASK_ID_KEYS, |v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Find a status string at the top level or under `data`
pub fn extract_status(body: &Value) -> Option<String> {
    lookup(body, STATUS_KEYS, |v| v.as_str().map(str::to_string))
}

/// Find a human-readable error message at the top level or under `data`
pub fn extract_error_message(body: &Value) -> Option<String> {
    lookup(body, ERROR_KEYS, |v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    })
}

/// Classify a status string, case-insensitively
pub fn classify_status(status: &str) -> StatusClass {
    let normalized = status.trim().to_ascii_uppercase();
    match normalized.as_str() {
        "COMPLETED" | "SUCCESS" | "SUCCEEDED" => StatusClass::Success,
        s if s.contains("FAILED") || s.contains("ERROR") => StatusClass::Failure,
        _ => StatusClass::Pending,
    }
}

fn lookup<F>(body: &Value, keys: &[&str], extract: F) -> Option<String>
where
    F: Fn(&Value) -> Option<String>,
{
    let scopes = [Some(body), body.get("data")];
    for scope in scopes.into_iter().flatten() {
        for key in keys {
            if let Some(found) = scope.get(*key).and_then(&extract) {
                return Some(found);
            }
        }
    }
    None
}
