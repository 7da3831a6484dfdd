//! Bounded, backing-off job status polling
//!
//! Before every status check the poller sleeps for
//! `min(initial_delay * growth_factor^attempt, max_delay)`. The loop ends on
//! a terminal status, on a fatal provider reply, when the wall-clock budget
//! runs out, or when the caller cancels.

use crate::job::{JobStatus, MediaJob};
use crate::parser::{parse_clips, Clip};
use crate::provider::{
    classify_status, extract_error_message, extract_status, MediaProvider, ProviderResponse,
    StatusClass, StatusEndpoint,
};
use ember_core::{truncate_snapshot, CancelToken, Clock, EmberError, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const PAYLOAD_SNAPSHOT_LIMIT: usize = 2048;

/// Timing rules for a polling loop
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub growth_factor: f64,
    pub max_delay: Duration,
    /// Total wall-clock budget
    pub timeout: Duration,
    /// Attempts during which not-found replies are tolerated
    pub not_found_grace: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            growth_factor: 1.5,
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(180),
            not_found_grace: 5,
        }
    }
}

impl PollPolicy {
    /// Delay before the check numbered `attempt` (zero-based). Not jittered.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.growth_factor.powi(exponent);
        let max = self.max_delay.as_secs_f64();
        if !secs.is_finite() || secs >= max {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Polls one job at a time; status checks never overlap
pub struct JobPoller {
    provider: Arc<dyn MediaProvider>,
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
}

impl JobPoller {
    pub fn new(provider: Arc<dyn MediaProvider>, clock: Arc<dyn Clock>, policy: PollPolicy) -> Self {
        Self {
            provider,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Wait for `job` to finish and extract its clips
    pub fn poll(&self, job: &mut MediaJob, cancel: &CancelToken) -> Result<Vec<Clip>> {
        let payload = self.wait_for_completion(job, cancel)?;
        parse_clips(&payload)
    }

    /// Wait for `job` to reach a terminal status.
    ///
    /// On success returns the outermost, unmodified status payload, since
    /// clips may sit beside or above the `data` wrapper that status
    /// extraction looks into.
    pub fn wait_for_completion(&self, job: &mut MediaJob, cancel: &CancelToken) -> Result<Value> {
        self.wait_with_progress(job, cancel, &|_| {})
    }

    /// Like [`wait_for_completion`](Self::wait_for_completion), calling
    /// `on_attempt` with the attempt number just before each status check
    pub fn wait_with_progress(
        &self,
        job: &mut MediaJob,
        cancel: &CancelToken,
        on_attempt: &dyn Fn(u32),
    ) -> Result<Value> {
        let task_id = job
            .task_id
            .clone()
            .ok_or_else(|| EmberError::ProviderRequest(format!("Job {} has no task id", job.id)))?;

        let started = self.clock.now();
        let mut attempt: u32 = 0;
        let mut last_payload = Value::Null;

        loop {
            let elapsed = self.clock.now().saturating_sub(started);
            if elapsed >= self.policy.timeout {
                return Err(self.timed_out(job, task_id, attempt, elapsed, &last_payload));
            }

            // Never sleep past the budget
            let delay = self.policy.delay_for(attempt).min(self.policy.timeout - elapsed);
            if self.clock.sleep(delay, cancel) {
                job.advance(JobStatus::Failed);
                info!(task_id = %task_id, attempts = attempt, "polling cancelled");
                return Err(EmberError::Cancelled {
                    task_id,
                    attempts: attempt,
                });
            }

            let elapsed = self.clock.now().saturating_sub(started);
            if elapsed >= self.policy.timeout {
                return Err(self.timed_out(job, task_id, attempt, elapsed, &last_payload));
            }

            attempt += 1;
            on_attempt(attempt);

            let response = self.check_status(&task_id)?;
            debug!(
                task_id = %task_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                http_status = response.http_status,
                "status check"
            );

            if response.is_not_found() {
                last_payload = response.body;
                if attempt > self.policy.not_found_grace {
                    job.advance(JobStatus::Failed);
                    return Err(EmberError::TaskNotFound {
                        task_id,
                        attempts: attempt,
                        last_payload: snapshot(&last_payload),
                    });
                }
                debug!(task_id = %task_id, attempt, "task not registered yet");
                continue;
            }

            if !response.is_success() {
                job.advance(JobStatus::Failed);
                let message = extract_error_message(&response.body)
                    .unwrap_or_else(|| response.snapshot());
                return Err(EmberError::StatusFailed {
                    task_id,
                    http_status: response.http_status,
                    message,
                    attempts: attempt,
                    last_payload: snapshot(&response.body),
                });
            }

            let status = extract_status(&response.body).unwrap_or_default();
            last_payload = response.body;

            match classify_status(&status) {
                StatusClass::Success => {
                    job.advance(JobStatus::Completed);
                    info!(task_id = %task_id, attempts = attempt, status = %status, "task completed");
                    return Ok(last_payload);
                }
                StatusClass::Failure => {
                    job.advance(JobStatus::Failed);
                    let message = extract_error_message(&last_payload)
                        .unwrap_or_else(|| format!("provider reported {}", status));
                    warn!(task_id = %task_id, status = %status, "task failed");
                    return Err(EmberError::ProviderTaskFailed {
                        task_id,
                        status,
                        message,
                        attempts: attempt,
                        last_payload: snapshot(&last_payload),
                    });
                }
                StatusClass::Pending => {
                    job.advance(JobStatus::Processing);
                }
            }
        }
    }

    fn timed_out(
        &self,
        job: &mut MediaJob,
        task_id: String,
        attempts: u32,
        elapsed: Duration,
        last_payload: &Value,
    ) -> EmberError {
        job.advance(JobStatus::Failed);
        warn!(task_id = %task_id, attempts, "polling timed out");
        EmberError::PollTimeout {
            task_id,
            attempts,
            elapsed_secs: elapsed.as_secs_f64(),
            last_payload: snapshot(last_payload),
        }
    }

    /// Query the primary endpoint, falling back to the legacy one on not-found
    fn check_status(&self, task_id: &str) -> Result<ProviderResponse> {
        let primary = self.provider.status(task_id, StatusEndpoint::Primary)?;
        if !primary.is_not_found() {
            return Ok(primary);
        }
        debug!(task_id, "primary status endpoint reported not found, trying legacy");
        self.provider.status(task_id, StatusEndpoint::Legacy)
    }
}

fn snapshot(payload: &Value) -> String {
    let text = match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    truncate_snapshot(&text, PAYLOAD_SNAPSHOT_LIMIT)
}
