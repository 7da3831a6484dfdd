//! Ember Gen - external media generation pipeline
//!
//! Submits prompts to a pluggable media provider, polls the resulting job
//! with capped exponential backoff, extracts every result clip from the
//! completed payload, and records them in the asset vault and gallery cache.

pub mod config;
pub mod job;
pub mod orchestrator;
pub mod parser;
pub mod poller;
pub mod provider;
pub mod providers;

pub use config::EmberConfig;
pub use job::{GenerationRequest, JobStatus, MediaJob};
pub use orchestrator::{prompt_signature, CycleEvent, CycleRequest, Orchestrator};
pub use parser::{parse_clips, Clip, ClipKind};
pub use poller::{JobPoller, PollPolicy};
pub use provider::{
    classify_status, extract_status, extract_task_id, MediaProvider, ProviderResponse,
    ProviderStatus, StatusClass, StatusEndpoint,
};
