//! Mock provider for testing and offline demos
//!
//! Without a script it behaves like a well-mannered provider: submit
//! returns a fresh task id, the first status check reports `PROCESSING`,
//! and later checks report `SUCCESS` with one clip derived from the
//! submitted prompt. Scripted responses take precedence; the last scripted
//! response for an endpoint repeats once the script runs out.

use crate::job::GenerationRequest;
use crate::provider::{
    parse_submit_response, MediaProvider, ProviderResponse, ProviderStatus, StatusEndpoint,
};
use ember_core::Result;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MockState {
    submit: Option<ProviderResponse>,
    primary: VecDeque<ProviderResponse>,
    legacy: VecDeque<ProviderResponse>,
    submitted: Vec<GenerationRequest>,
    primary_calls: u32,
    legacy_calls: u32,
    demo_checks: HashMap<String, u32>,
}

/// A provider that answers from memory without any network calls
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
    scripted: bool,
}

impl MockProvider {
    /// Demo provider that completes every job on the second status check
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that answers only from pushed responses.
    ///
    /// Unscripted primary checks report `PROCESSING`; the legacy endpoint
    /// reports not-found unless scripted.
    pub fn scripted() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            scripted: true,
        }
    }

    /// Reply to every submit with `response`
    pub fn set_submit_response(&self, response: ProviderResponse) {
        self.lock().submit = Some(response);
    }

    /// Queue a primary status response
    pub fn push_status(&self, response: ProviderResponse) {
        self.lock().primary.push_back(response);
    }

    /// Queue a legacy status response
    pub fn push_legacy_status(&self, response: ProviderResponse) {
        self.lock().legacy.push_back(response);
    }

    /// Number of status checks made against `endpoint`
    pub fn status_calls(&self, endpoint: StatusEndpoint) -> u32 {
        let state = self.lock();
        match endpoint {
            StatusEndpoint::Primary => state.primary_calls,
            StatusEndpoint::Legacy => state.legacy_calls,
        }
    }

    /// Every request submitted so far
    pub fn submitted(&self) -> Vec<GenerationRequest> {
        self.lock().submitted.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MediaProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn health_check(&self) -> ProviderStatus {
        ProviderStatus::Available
    }

    fn submit(&self, request: &GenerationRequest) -> Result<String> {
        let response = {
            let mut state = self.lock();
            state.submitted.push(request.clone());
            state.submit.clone()
        };
        let response = response.unwrap_or_else(|| {
            let task_id = format!("mock-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
            ProviderResponse::new(200, json!({"code": 200, "data": {"taskId": task_id}}))
        });
        parse_submit_response(&response)
    }

    fn status(&self, task_id: &str, endpoint: StatusEndpoint) -> Result<ProviderResponse> {
        let mut state = self.lock();
        let queue = match endpoint {
            StatusEndpoint::Primary => {
                state.primary_calls += 1;
                &mut state.primary
            }
            StatusEndpoint::Legacy => {
                state.legacy_calls += 1;
                &mut state.legacy
            }
        };

        if let Some(response) = next_scripted(queue) {
            return Ok(response);
        }

        match endpoint {
            StatusEndpoint::Legacy => Ok(ProviderResponse::new(
                404,
                json!({"code": 404, "msg": "task not found"}),
            )),
            StatusEndpoint::Primary if self.scripted => Ok(ProviderResponse::new(
                200,
                json!({"code": 200, "data": {"taskId": task_id, "status": "PROCESSING"}}),
            )),
            StatusEndpoint::Primary => {
                let prompt = state
                    .submitted
                    .last()
                    .map(|r| r.prompt.clone())
                    .unwrap_or_default();
                let duration = state.submitted.last().and_then(|r| r.duration);
                let checks = state.demo_checks.entry(task_id.to_string()).or_insert(0);
                *checks += 1;
                Ok(demo_response(task_id, &prompt, duration, *checks))
            }
        }
    }
}

/// Pop the front response, repeating the final one
fn next_scripted(queue: &mut VecDeque<ProviderResponse>) -> Option<ProviderResponse> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

fn demo_response(
    task_id: &str,
    prompt: &str,
    duration: Option<f64>,
    check: u32,
) -> ProviderResponse {
    if check < 2 {
        return ProviderResponse::new(
            200,
            json!({"code": 200, "data": {"taskId": task_id, "status": "PROCESSING"}}),
        );
    }

    let mut title: String = prompt.split(',').next().unwrap_or("").trim().chars().take(40).collect();
    if title.is_empty() {
        title = "Untitled".to_string();
    }
    ProviderResponse::new(
        200,
        json!({
            "code": 200,
            "data": {
                "taskId": task_id,
                "status": "SUCCESS",
                "response": {
                    "clips": [{
                        "id": format!("{}-0", task_id),
                        "audioUrl": format!("https://mock.ember.local/{}/0.mp3", task_id),
                        "imageUrl": format!("https://mock.ember.local/{}/0.jpg", task_id),
                        "duration": duration.unwrap_or(30.0),
                        "title": title,
                    }]
                }
            }
        }),
    )
}
