//! HTTP media provider
//!
//! Talks to a JSON-over-HTTP generation service: `POST {api_url}{submit_path}`
//! to start a job, `GET {api_url}{status_path}?taskId=..` to check it, and
//! the same against `legacy_status_path` when the primary endpoint does not
//! know the task yet.

use crate::config::EmberConfig;
use crate::job::GenerationRequest;
use crate::provider::{
    parse_submit_response, MediaProvider, ProviderResponse, ProviderStatus, StatusEndpoint,
};
use ember_core::{EmberError, Result};
use std::time::Duration;
use tracing::debug;

pub const PROVIDER_NAME: &str = "http";
const DEFAULT_SUBMIT_PATH: &str = "/api/v1/generate";
const DEFAULT_STATUS_PATH: &str = "/api/v1/generate/record-info";
const DEFAULT_LEGACY_STATUS_PATH: &str = "/api/v1/query";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_RETRIES: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Provider backed by a remote HTTP API
pub struct HttpMediaProvider {
    api_key: String,
    api_url: String,
    submit_path: String,
    status_path: String,
    legacy_status_path: String,
}

impl HttpMediaProvider {
    /// Create a new HttpMediaProvider from config
    pub fn from_config(config: &EmberConfig) -> Result<Self> {
        let api_key = config
            .api_key(PROVIDER_NAME)
            .ok_or_else(|| {
                EmberError::ConfigError(
                    "HTTP provider API key not configured. Set EMBER_HTTP_API_KEY or add to .ember/config.toml".to_string(),
                )
            })?
            .to_string();

        let api_url = config.api_url(PROVIDER_NAME).ok_or_else(|| {
            EmberError::ConfigError(
                "HTTP provider API URL not configured. Set EMBER_HTTP_API_URL or add to .ember/config.toml".to_string(),
            )
        })?;

        let provider = config.provider(PROVIDER_NAME);
        let pick = |value: Option<&String>, default: &str| {
            value.cloned().unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            submit_path: pick(provider.and_then(|p| p.submit_path.as_ref()), DEFAULT_SUBMIT_PATH),
            status_path: pick(provider.and_then(|p| p.status_path.as_ref()), DEFAULT_STATUS_PATH),
            legacy_status_path: pick(
                provider.and_then(|p| p.legacy_status_path.as_ref()),
                DEFAULT_LEGACY_STATUS_PATH,
            ),
        })
    }

    fn status_url(&self, endpoint: StatusEndpoint) -> String {
        match endpoint {
            StatusEndpoint::Primary => format!("{}{}", self.api_url, self.status_path),
            StatusEndpoint::Legacy => format!("{}{}", self.api_url, self.legacy_status_path),
        }
    }

    fn get_with_retry(&self, url: &str, task_id: &str) -> Result<ProviderResponse> {
        for attempt in 0..MAX_RETRIES {
            let agent = build_agent();
            let response = agent
                .get(url)
                .query("taskId", task_id)
                .header("Authorization", &format!("Bearer {}", self.api_key))
                .call();

            match response {
                Ok(mut ok) => {
                    let http_status = ok.status().as_u16();
                    let text = ok.body_mut().read_to_string().map_err(|e| {
                        EmberError::ProviderRequest(format!("Failed to read status response: {}", e))
                    })?;
                    return Ok(ProviderResponse::from_text(http_status, text));
                }
                Err(e) => {
                    if attempt + 1 < MAX_RETRIES && is_retryable_error(&e) {
                        debug!(url, attempt, error = %e, "retrying status request");
                        sleep_backoff(attempt);
                        continue;
                    }
                    return Err(EmberError::ProviderRequest(format!(
                        "Status request failed: {}",
                        e
                    )));
                }
            }
        }

        Err(EmberError::ProviderRequest(
            "Status request failed after retries".to_string(),
        ))
    }
}

impl MediaProvider for HttpMediaProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn health_check(&self) -> ProviderStatus {
        if self.api_key.is_empty() {
            return ProviderStatus::NoApiKey;
        }
        ProviderStatus::Available
    }

    fn submit(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}{}", self.api_url, self.submit_path);
        let payload = build_submit_payload(request);

        let mut response = build_agent()
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send_json(&payload)
            .map_err(|e| EmberError::SubmitFailed {
                reason: format!("request failed: {}", e),
                body: String::new(),
            })?;

        let http_status = response.status().as_u16();
        let text = response.body_mut().read_to_string().map_err(|e| EmberError::SubmitFailed {
            reason: format!("unreadable response: {}", e),
            body: String::new(),
        })?;

        parse_submit_response(&ProviderResponse::from_text(http_status, text))
    }

    fn status(&self, task_id: &str, endpoint: StatusEndpoint) -> Result<ProviderResponse> {
        self.get_with_retry(&self.status_url(endpoint), task_id)
    }
}

/// JSON body for a submit call
pub fn build_submit_payload(request: &GenerationRequest) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "prompt": request.prompt,
        "instrumental": request.instrumental,
        "model": request.model,
        "customMode": false
    });
    if let Some(duration) = request.duration {
        payload["duration"] = serde_json::json!(duration);
    }
    payload
}

/// Agent that hands non-2xx replies back as responses instead of errors
fn build_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .http_status_as_error(false)
        .build();
    config.into()
}

fn is_retryable_error(e: &ureq::Error) -> bool {
    matches!(
        e,
        ureq::Error::Timeout(_)
            | ureq::Error::Io(_)
            | ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
    )
}

fn sleep_backoff(attempt: usize) {
    let delay_ms = RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt);
    std::thread::sleep(Duration::from_millis(delay_ms));
}
