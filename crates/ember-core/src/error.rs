//! Error types for Ember

use thiserror::Error;

/// The main error type for Ember operations
#[derive(Debug, Error)]
pub enum EmberError {
    #[error("Submit failed: {reason} (response: {body})")]
    SubmitFailed { reason: String, body: String },

    #[error("Task {task_id} not found after {attempts} attempts; last payload: {last_payload}")]
    TaskNotFound {
        task_id: String,
        attempts: u32,
        last_payload: String,
    },

    #[error(
        "Task {task_id} failed with status {status} after {attempts} attempts: {message}; last payload: {last_payload}"
    )]
    ProviderTaskFailed {
        task_id: String,
        status: String,
        message: String,
        attempts: u32,
        last_payload: String,
    },

    #[error(
        "Status check for task {task_id} failed (HTTP {http_status}) on attempt {attempts}: {message}; last payload: {last_payload}"
    )]
    StatusFailed {
        task_id: String,
        http_status: u16,
        message: String,
        attempts: u32,
        last_payload: String,
    },

    #[error(
        "Polling task {task_id} timed out after {elapsed_secs:.1}s ({attempts} attempts); last payload: {last_payload}"
    )]
    PollTimeout {
        task_id: String,
        attempts: u32,
        elapsed_secs: f64,
        last_payload: String,
    },

    #[error("Polling task {task_id} cancelled after {attempts} attempts")]
    Cancelled { task_id: String, attempts: u32 },

    #[error("No artifacts found in payload: {snapshot}")]
    NoArtifactsFound { snapshot: String },

    #[error("Failed to persist artifact {url}: {reason}")]
    PersistFailure { url: String, reason: String },

    #[error("Provider request failed: {0}")]
    ProviderRequest(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Asset error: {0}")]
    AssetError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(String),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

/// Result type alias for Ember operations
pub type Result<T> = std::result::Result<T, EmberError>;

impl From<serde_json::Error> for EmberError {
    fn from(err: serde_json::Error) -> Self {
        EmberError::JsonError(err.to_string())
    }
}

impl From<toml::de::Error> for EmberError {
    fn from(err: toml::de::Error) -> Self {
        EmberError::TomlParseError(err.to_string())
    }
}

/// Shorten a diagnostic payload to at most `max` bytes, on a char boundary.
pub fn truncate_snapshot(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes total)", &text[..end], text.len())
}
