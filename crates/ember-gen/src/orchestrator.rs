//! Full generation cycle: submit, poll, parse, persist
//!
//! One call to [`Orchestrator::run_full_cycle`] drives a single job through
//! `Submitted -> Polling -> Parsed -> Persisting -> Done`. Every extracted
//! clip is saved to the asset sink on its own; a failed save is logged and
//! the clip's URL is still returned. The gallery cache is written once, after
//! all saves were attempted.

use crate::job::{GenerationRequest, MediaJob};
use crate::parser::{parse_clips, Clip, ClipKind};
use crate::poller::{JobPoller, PollPolicy};
use crate::provider::MediaProvider;
use chrono::{DateTime, Utc};
use ember_asset::{AssetDraft, AssetSink, AssetType, GalleryCache, PersistedTrack};
use ember_core::{
    now_utc, prefixed_id, CancelToken, Clock, EmberError, Listeners, Result, Subscription,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

const SIGNATURE_MAX_CHARS: usize = 30;
const DEFAULT_MODULE: &str = "music";
const DEFAULT_MODEL: &str = "V4";

/// Caller input for one cycle
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleRequest {
    pub prompt: String,
    pub instrumental: bool,
    pub owner_id: Option<String>,
    /// Cover image used instead of whatever the provider returned
    pub cover_override: Option<String>,
    /// Requested duration in seconds
    pub duration: Option<f64>,
}

impl CycleRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn instrumental(mut self, instrumental: bool) -> Self {
        self.instrumental = instrumental;
        self
    }

    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn cover(mut self, url: impl Into<String>) -> Self {
        self.cover_override = Some(url.into());
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }
}

/// Progress notifications published during a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    Submitted { job_id: String, task_id: String },
    Polling { attempt: u32 },
    Parsed { count: usize },
    Persisting { index: usize, url: String },
    Done { urls: Vec<String> },
    Failed { message: String },
}

/// Drives generation jobs from prompt to persisted assets
pub struct Orchestrator {
    provider: Arc<dyn MediaProvider>,
    poller: JobPoller,
    assets: Arc<dyn AssetSink>,
    gallery: Arc<GalleryCache>,
    listeners: Listeners<CycleEvent>,
    module: String,
    model: String,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        clock: Arc<dyn Clock>,
        policy: PollPolicy,
        assets: Arc<dyn AssetSink>,
        gallery: Arc<GalleryCache>,
    ) -> Self {
        Self {
            poller: JobPoller::new(Arc::clone(&provider), clock, policy),
            provider,
            assets,
            gallery,
            listeners: Listeners::new(),
            module: DEFAULT_MODULE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Provider model identifier sent with every submit
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Module name recorded on saved assets
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&CycleEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Run one job to completion and return the URL of every clip it produced.
    ///
    /// Fails with whatever submit, polling or parsing failed with. Once clips
    /// exist the call succeeds, even if saving some of them failed.
    pub fn run_full_cycle(&self, request: &CycleRequest, cancel: &CancelToken) -> Result<Vec<String>> {
        match self.run(request, cancel) {
            Ok(urls) => {
                self.listeners.emit(&CycleEvent::Done { urls: urls.clone() });
                Ok(urls)
            }
            Err(e) => {
                error!(provider = self.provider.name(), error = %e, "generation cycle failed");
                self.listeners.emit(&CycleEvent::Failed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn run(&self, request: &CycleRequest, cancel: &CancelToken) -> Result<Vec<String>> {
        let mut job = MediaJob::new(GenerationRequest {
            prompt: request.prompt.clone(),
            instrumental: request.instrumental,
            duration: request.duration,
            model: self.model.clone(),
        });

        let task_id = self.provider.submit(&job.request)?;
        info!(job_id = %job.id, task_id = %task_id, provider = self.provider.name(), "job submitted");
        job.task_id = Some(task_id.clone());
        self.listeners.emit(&CycleEvent::Submitted {
            job_id: job.id.clone(),
            task_id,
        });

        let payload = self.poller.wait_with_progress(&mut job, cancel, &|attempt| {
            self.listeners.emit(&CycleEvent::Polling { attempt });
        })?;
        let clips = parse_clips(&payload)?;
        self.listeners.emit(&CycleEvent::Parsed { count: clips.len() });

        let signature = prompt_signature(&request.prompt);
        let created_at = now_utc();
        let mut urls = Vec::with_capacity(clips.len());
        let mut tracks = Vec::with_capacity(clips.len());

        for (index, clip) in clips.iter().enumerate() {
            self.listeners.emit(&CycleEvent::Persisting {
                index,
                url: clip.url.clone(),
            });

            let title = clip_title(clip, &signature, index);
            let record_id = match self.persist_clip(&job, request, clip, &title, &signature) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(url = %clip.url, error = %e, "clip kept without an asset record");
                    None
                }
            };

            urls.push(clip.url.clone());
            // The gallery only lists audio
            if clip.kind != ClipKind::Audio {
                continue;
            }
            tracks.push(PersistedTrack {
                id: clip
                    .id
                    .clone()
                    .or(record_id)
                    .unwrap_or_else(|| prefixed_id("TRK")),
                url: clip.url.clone(),
                title,
                cover_url: request.cover_override.clone().or_else(|| clip.cover_url.clone()),
                duration: clip.duration.or(request.duration),
                created_at: track_time(created_at, index),
                prompt_signature: signature.clone(),
                instrumental: request.instrumental,
                extra: serde_json::Map::new(),
            });
        }

        if !tracks.is_empty() {
            if let Err(e) = self.gallery.upsert(&tracks) {
                warn!(path = %self.gallery.path().display(), error = %e, "gallery cache not updated");
            }
        }

        info!(job_id = %job.id, clips = urls.len(), "generation cycle complete");
        Ok(urls)
    }

    fn persist_clip(
        &self,
        job: &MediaJob,
        request: &CycleRequest,
        clip: &Clip,
        title: &str,
        signature: &str,
    ) -> Result<String> {
        let cover = request.cover_override.as_ref().or(clip.cover_url.as_ref());
        let asset_type = match clip.kind {
            ClipKind::Audio => AssetType::Audio,
            ClipKind::Video => AssetType::Video,
        };
        let draft = AssetDraft::new(asset_type, title, clip.url.clone(), self.module.clone())
            .with_owner(request.owner_id.clone())
            .with_metadata(json!({
                "jobId": job.id,
                "taskId": job.task_id,
                "clipId": clip.id,
                "coverUrl": cover,
                "duration": clip.duration.or(request.duration),
                "promptSignature": signature,
                "instrumental": request.instrumental,
                "model": job.request.model,
            }));

        self.assets
            .persist(draft)
            .map(|record| record.id)
            .map_err(|e| EmberError::PersistFailure {
                url: clip.url.clone(),
                reason: e.to_string(),
            })
    }
}

/// First clause of `prompt` (up to the first comma), at most 30 characters
pub fn prompt_signature(prompt: &str) -> String {
    let clause = prompt.split(',').next().unwrap_or("").trim();
    clause.chars().take(SIGNATURE_MAX_CHARS).collect::<String>().trim_end().to_string()
}

fn clip_title(clip: &Clip, signature: &str, index: usize) -> String {
    match clip.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ if signature.is_empty() => format!("Untitled #{}", index + 1),
        _ => format!("{} #{}", signature, index + 1),
    }
}

/// Clips of one batch keep their extraction order when sorted newest-first
fn track_time(base: DateTime<Utc>, index: usize) -> DateTime<Utc> {
    base - chrono::Duration::milliseconds(index as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderResponse, StatusEndpoint};
    use crate::providers::mock::MockProvider;
    use ember_asset::{AssetRecord, AssetStore};
    use ember_core::ManualClock;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct Fixture {
        dir: PathBuf,
        provider: Arc<MockProvider>,
        store: Arc<AssetStore>,
        gallery: Arc<GalleryCache>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("ember_cycle_test_{}", uuid::Uuid::new_v4()));
            std::fs::create_dir_all(&dir).unwrap();
            let provider = Arc::new(MockProvider::scripted());
            provider.set_submit_response(ProviderResponse::new(
                200,
                json!({"code": 200, "data": {"taskId": "task-42"}}),
            ));
            Self {
                gallery: Arc::new(GalleryCache::new(dir.join("gallery.json"))),
                dir,
                provider,
                store: Arc::new(AssetStore::new()),
            }
        }

        fn orchestrator(&self) -> Orchestrator {
            self.orchestrator_with_sink(self.store.clone())
        }

        fn orchestrator_with_sink(&self, sink: Arc<dyn AssetSink>) -> Orchestrator {
            Orchestrator::new(
                self.provider.clone(),
                Arc::new(ManualClock::new()),
                PollPolicy::default(),
                sink,
                Arc::clone(&self.gallery),
            )
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    /// Fails for any URL containing "broken", stores everything else
    struct FlakySink {
        inner: Arc<AssetStore>,
    }

    impl AssetSink for FlakySink {
        fn persist(&self, draft: AssetDraft) -> Result<AssetRecord> {
            if draft.payload.contains("broken") {
                return Err(EmberError::AssetError("disk full".to_string()));
            }
            self.inner.persist(draft)
        }
    }

    fn processing() -> ProviderResponse {
        ProviderResponse::new(200, json!({"code": 200, "data": {"status": "PROCESSING"}}))
    }

    #[test]
    fn test_lofi_cycle_end_to_end() {
        let fx = Fixture::new();
        fx.provider.push_status(processing());
        fx.provider.push_status(processing());
        fx.provider.push_status(ProviderResponse::new(
            200,
            json!({
                "code": 200,
                "data": {
                    "status": "COMPLETED",
                    "response": {"clips": [{
                        "id": "clip-a",
                        "audio_url": "https://cdn.example/a.mp3",
                        "title": "Café Loop",
                        "duration": 30
                    }]}
                }
            }),
        ));

        let request = CycleRequest::new("Lo-fi café ambience")
            .instrumental(true)
            .duration(30.0);
        let urls = fx.orchestrator().run_full_cycle(&request, &CancelToken::new()).unwrap();
        assert_eq!(urls, vec!["https://cdn.example/a.mp3"]);

        let records = fx.store.by_type(AssetType::Audio);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Café Loop");
        assert_eq!(records[0].payload, "https://cdn.example/a.mp3");
        assert_eq!(records[0].module, "music");

        let tracks = fx.gallery.read();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].prompt_signature, "Lo-fi café ambience");
        assert_eq!(tracks[0].id, "clip-a");
        assert!(tracks[0].instrumental);

        let submitted = fx.provider.submitted();
        assert_eq!(submitted[0].duration, Some(30.0));
        assert!(submitted[0].instrumental);
        assert_eq!(fx.provider.status_calls(StatusEndpoint::Primary), 3);
    }

    #[test]
    fn test_video_clip_is_stored_as_video_and_kept_out_of_gallery() {
        let fx = Fixture::new();
        fx.provider.push_status(ProviderResponse::new(
            200,
            json!({"status": "SUCCESS", "clips": [
                {"id": "v-1", "video_url": "https://cdn.example/v.mp4"},
                {"id": "a-1", "audio_url": "https://cdn.example/a.mp3"}
            ]}),
        ));

        let urls = fx
            .orchestrator()
            .run_full_cycle(&CycleRequest::new("city at night"), &CancelToken::new())
            .unwrap();
        assert_eq!(urls, vec!["https://cdn.example/v.mp4", "https://cdn.example/a.mp3"]);

        let videos = fx.store.by_type(AssetType::Video);
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].payload, "https://cdn.example/v.mp4");
        assert_eq!(fx.store.by_type(AssetType::Audio).len(), 1);

        let tracks = fx.gallery.read();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].url, "https://cdn.example/a.mp3");
    }

    #[test]
    fn test_video_only_cycle_leaves_gallery_untouched() {
        let fx = Fixture::new();
        fx.provider.push_status(ProviderResponse::new(
            200,
            json!({"status": "SUCCESS", "videoUrl": "https://cdn.example/only.mp4"}),
        ));

        let urls = fx
            .orchestrator()
            .run_full_cycle(&CycleRequest::new("waves"), &CancelToken::new())
            .unwrap();
        assert_eq!(urls, vec!["https://cdn.example/only.mp4"]);
        assert!(fx.gallery.read().is_empty());
        assert!(!fx.gallery.path().exists());
    }

    #[test]
    fn test_persist_failure_keeps_url_and_gallery_entry() {
        let fx = Fixture::new();
        fx.provider.push_status(ProviderResponse::new(
            200,
            json!({"status": "SUCCESS", "clips": [
                {"audio_url": "https://cdn.example/ok-1.mp3"},
                {"audio_url": "https://cdn.example/broken.mp3"},
                {"audio_url": "https://cdn.example/ok-2.mp3"}
            ]}),
        ));

        let sink = Arc::new(FlakySink {
            inner: fx.store.clone(),
        });
        let urls = fx
            .orchestrator_with_sink(sink)
            .run_full_cycle(&CycleRequest::new("Rain, thunder"), &CancelToken::new())
            .unwrap();

        assert_eq!(
            urls,
            vec![
                "https://cdn.example/ok-1.mp3",
                "https://cdn.example/broken.mp3",
                "https://cdn.example/ok-2.mp3"
            ]
        );
        assert_eq!(fx.store.len(), 2);
        assert_eq!(fx.gallery.len(), 3);
        assert!(fx.gallery.find_by_url("https://cdn.example/broken.mp3").is_some());

        let order: Vec<String> = fx.gallery.read().into_iter().map(|t| t.url).collect();
        assert_eq!(order, urls);
    }

    #[test]
    fn test_cover_override_and_title_fallback() {
        let fx = Fixture::new();
        fx.provider.push_status(ProviderResponse::new(
            200,
            json!({"status": "SUCCESS", "audio_url": "https://cdn.example/c.mp3",
                   "image_url": "https://cdn.example/provider.jpg"}),
        ));

        let request = CycleRequest::new("Slow piano, rain on glass")
            .owner("user-7")
            .cover("https://covers.example/mine.jpg");
        fx.orchestrator().run_full_cycle(&request, &CancelToken::new()).unwrap();

        let record = &fx.store.by_owner("user-7")[0];
        assert_eq!(record.title, "Slow piano #1");
        let metadata = record.metadata.as_ref().unwrap();
        assert_eq!(metadata["coverUrl"], "https://covers.example/mine.jpg");
        assert_eq!(metadata["taskId"], "task-42");

        let track = fx.gallery.find_by_url("https://cdn.example/c.mp3").unwrap();
        assert_eq!(track.cover_url.as_deref(), Some("https://covers.example/mine.jpg"));
        assert_eq!(track.prompt_signature, "Slow piano");
    }

    #[test]
    fn test_submit_failure_aborts_without_side_effects() {
        let fx = Fixture::new();
        fx.provider.set_submit_response(ProviderResponse::new(
            500,
            json!({"msg": "upstream unavailable"}),
        ));

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let orchestrator = fx.orchestrator();
        let _sub = orchestrator.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        let err = orchestrator
            .run_full_cycle(&CycleRequest::new("anything"), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, EmberError::SubmitFailed { .. }));
        assert!(fx.store.is_empty());
        assert!(fx.gallery.is_empty());
        assert_eq!(fx.provider.status_calls(StatusEndpoint::Primary), 0);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], CycleEvent::Failed { message } if message.contains("upstream unavailable")));
    }

    #[test]
    fn test_not_found_cycle_fails_with_task_not_found() {
        let fx = Fixture::new();
        fx.provider.push_status(ProviderResponse::new(404, json!({"msg": "no such task"})));

        let err = fx
            .orchestrator()
            .run_full_cycle(&CycleRequest::new("x"), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, EmberError::TaskNotFound { attempts: 6, .. }));
        assert!(fx.gallery.is_empty());
    }

    #[test]
    fn test_event_sequence() {
        let fx = Fixture::new();
        fx.provider.push_status(processing());
        fx.provider.push_status(ProviderResponse::new(
            200,
            json!({"status": "SUCCESS", "audio_url": "https://cdn.example/e.mp3"}),
        ));

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let orchestrator = fx.orchestrator();
        let _sub = orchestrator.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        orchestrator
            .run_full_cycle(&CycleRequest::new("x"), &CancelToken::new())
            .unwrap();

        let events = events.lock().unwrap();
        assert!(matches!(&events[0], CycleEvent::Submitted { task_id, .. } if task_id == "task-42"));
        assert_eq!(
            events[1..],
            [
                CycleEvent::Polling { attempt: 1 },
                CycleEvent::Polling { attempt: 2 },
                CycleEvent::Parsed { count: 1 },
                CycleEvent::Persisting {
                    index: 0,
                    url: "https://cdn.example/e.mp3".to_string()
                },
                CycleEvent::Done {
                    urls: vec!["https://cdn.example/e.mp3".to_string()]
                },
            ]
        );
    }

    #[test]
    fn test_prompt_signature() {
        assert_eq!(prompt_signature("Lo-fi café ambience"), "Lo-fi café ambience");
        assert_eq!(prompt_signature("  Rain, thunder, wind"), "Rain");
        assert_eq!(
            prompt_signature("An extremely long first clause that keeps going"),
            "An extremely long first clause"
        );
        assert_eq!(prompt_signature(""), "");
    }
}
