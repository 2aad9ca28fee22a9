//! End-to-end pipeline tests against the in-memory store and fake vendors.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use leadrole_models::{
    Gender, Job, JobId, JobOptions, JobStatus, NarrationRequest, Persona, ResumePoint, VideoSpec,
    VoiceProfile,
};
use leadrole_providers::{PollConfig, ProviderResult};
use leadrole_queue::{QueueResult, WorkQueue};
use leadrole_storage::{ObjectStore, StorageResult, StoredObject};
use leadrole_store::{JobPatch, MemoryStore, RecordStore, StoreError, StoreResult};
use leadrole_worker::vendors::{
    BaseVideoProvider, BaseVideoUpdate, Compositor, FaceSwapProvider, LipSyncProvider,
    SpeechProvider, TransformHandle, TransformUpdate, VendorState,
};
use leadrole_worker::{
    Pipeline, PipelineContext, PipelineError, QueuedJobSweeper, SubmissionGate, SubmitRequest,
    WorkerConfig,
};

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct FakeBaseVideo {
    start_calls: AtomicUsize,
    updates: Mutex<VecDeque<BaseVideoUpdate>>,
    always_pending: bool,
}

impl FakeBaseVideo {
    fn with_updates(updates: Vec<BaseVideoUpdate>) -> Self {
        Self {
            updates: Mutex::new(updates.into()),
            ..Default::default()
        }
    }

    fn pending_forever() -> Self {
        Self {
            always_pending: true,
            ..Default::default()
        }
    }

    fn succeeded() -> BaseVideoUpdate {
        BaseVideoUpdate {
            state: VendorState::Succeeded,
            video_url: Some("https://vendor/base.mp4".into()),
            progress_video_url: None,
            preview_image_url: None,
            failure_reason: None,
        }
    }

    fn pending(progress: Option<&str>, frame: Option<&str>) -> BaseVideoUpdate {
        BaseVideoUpdate {
            state: VendorState::Processing,
            video_url: None,
            progress_video_url: progress.map(str::to_string),
            preview_image_url: frame.map(str::to_string),
            failure_reason: None,
        }
    }
}

#[async_trait]
impl BaseVideoProvider for FakeBaseVideo {
    async fn start(&self, _prompt: &str, _spec: &VideoSpec) -> ProviderResult<String> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok("gen-1".to_string())
    }

    async fn poll(&self, _generation_id: &str) -> ProviderResult<BaseVideoUpdate> {
        if self.always_pending {
            return Ok(Self::pending(None, None));
        }
        let mut updates = self.updates.lock().unwrap();
        Ok(updates.pop_front().unwrap_or_else(Self::succeeded))
    }
}

#[derive(Default)]
struct FakeFaceSwap {
    start_calls: AtomicUsize,
    fail: AtomicBool,
}

#[async_trait]
impl FaceSwapProvider for FakeFaceSwap {
    async fn start(
        &self,
        _face_url: &str,
        _target_video_url: &str,
    ) -> ProviderResult<TransformHandle> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TransformHandle {
            id: "pred-fs-1".into(),
            poll_url: Some("mem://fs".into()),
            web_url: Some("https://web/pred-fs-1".into()),
        })
    }

    async fn poll(&self, _handle: &TransformHandle) -> ProviderResult<TransformUpdate> {
        if self.fail.load(Ordering::SeqCst) {
            Ok(TransformUpdate {
                state: VendorState::Failed,
                output_url: None,
            })
        } else {
            Ok(TransformUpdate {
                state: VendorState::Succeeded,
                output_url: Some("https://vendor/fs-public.mp4".into()),
            })
        }
    }
}

#[derive(Default)]
struct FakeLipSync {
    start_calls: AtomicUsize,
    fail: AtomicBool,
}

#[async_trait]
impl LipSyncProvider for FakeLipSync {
    async fn start(&self, _video_url: &str, _audio_url: &str) -> ProviderResult<TransformHandle> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TransformHandle {
            id: "pred-ls-1".into(),
            poll_url: Some("mem://ls".into()),
            web_url: None,
        })
    }

    async fn poll(&self, _handle: &TransformHandle) -> ProviderResult<TransformUpdate> {
        if self.fail.load(Ordering::SeqCst) {
            Ok(TransformUpdate {
                state: VendorState::Failed,
                output_url: None,
            })
        } else {
            Ok(TransformUpdate {
                state: VendorState::Succeeded,
                output_url: Some("https://vendor/ls.mp4".into()),
            })
        }
    }
}

#[derive(Default)]
struct FakeSpeech {
    calls: AtomicUsize,
    last_profile: Mutex<Option<VoiceProfile>>,
    last_rate: Mutex<Option<f64>>,
}

#[async_trait]
impl SpeechProvider for FakeSpeech {
    async fn synthesize(
        &self,
        _text: &str,
        profile: VoiceProfile,
        speaking_rate: f64,
    ) -> ProviderResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_profile.lock().unwrap() = Some(profile);
        *self.last_rate.lock().unwrap() = Some(speaking_rate);
        Ok(b"mp3-bytes".to_vec())
    }
}

#[derive(Default)]
struct FakeObjects {
    mirrored: Mutex<Vec<(String, String)>>,
    stored_keys: Mutex<Vec<String>>,
}

impl FakeObjects {
    fn stored(key: &str) -> StoredObject {
        StoredObject {
            url: format!("https://store/{key}"),
            id: key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for FakeObjects {
    async fn put_bytes(
        &self,
        _bytes: Vec<u8>,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<StoredObject> {
        self.stored_keys.lock().unwrap().push(key.to_string());
        Ok(Self::stored(key))
    }

    async fn mirror_from_url(
        &self,
        url: &str,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<StoredObject> {
        self.mirrored
            .lock()
            .unwrap()
            .push((url.to_string(), key.to_string()));
        Ok(Self::stored(key))
    }
}

#[derive(Default)]
struct FakeCompositor {
    inputs: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Compositor for FakeCompositor {
    async fn composite(
        &self,
        video_url: &str,
        watermark_url: &str,
    ) -> Result<Vec<u8>, leadrole_media::MediaError> {
        self.inputs
            .lock()
            .unwrap()
            .push((video_url.to_string(), watermark_url.to_string()));
        Ok(b"watermarked".to_vec())
    }
}

#[derive(Default)]
struct FakeQueue {
    enqueued: Mutex<Vec<String>>,
}

#[async_trait]
impl WorkQueue for FakeQueue {
    async fn enqueue(&self, job_id: &JobId) -> QueueResult<String> {
        let mut enqueued = self.enqueued.lock().unwrap();
        enqueued.push(job_id.as_str().to_string());
        Ok(format!("msg-{}", enqueued.len()))
    }
}

/// Store wrapper that can be told to fail merges, for infrastructure-error
/// behavior tests.
struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_merges: AtomicBool,
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>> {
        self.inner.get_job(id).await
    }
    async fn create_job(&self, job: &Job) -> StoreResult<()> {
        self.inner.create_job(job).await
    }
    async fn merge_job(&self, id: &JobId, patch: JobPatch) -> StoreResult<()> {
        if self.fail_merges.load(Ordering::SeqCst) {
            return Err(StoreError::request_failed("HTTP 503: store unavailable"));
        }
        self.inner.merge_job(id, patch).await
    }
    async fn find_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Job>> {
        self.inner.find_by_idempotency_key(key).await
    }
    async fn list_by_owner(
        &self,
        owner_id: &str,
        filter: &leadrole_store::OwnerFilter,
    ) -> StoreResult<leadrole_store::JobPage> {
        self.inner.list_by_owner(owner_id, filter).await
    }
    async fn find_queued_older_than(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Job>> {
        self.inner.find_queued_older_than(cutoff, limit).await
    }
    async fn fetch_persona(&self, owner_id: &str) -> StoreResult<Option<Persona>> {
        self.inner.fetch_persona(owner_id).await
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    store: Arc<MemoryStore>,
    base: Arc<FakeBaseVideo>,
    faces: Arc<FakeFaceSwap>,
    lips: Arc<FakeLipSync>,
    speech: Arc<FakeSpeech>,
    objects: Arc<FakeObjects>,
    compositor: Arc<FakeCompositor>,
    pipeline: Pipeline,
}

fn fast_config() -> WorkerConfig {
    WorkerConfig {
        base_poll: PollConfig::new(Duration::from_millis(1), Duration::from_millis(250)),
        transform_poll: PollConfig::new(Duration::from_millis(1), Duration::from_millis(250)),
        watermark_url: "https://assets/watermark.png".to_string(),
        ..WorkerConfig::default()
    }
}

fn harness_with(base: FakeBaseVideo, config: WorkerConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let base = Arc::new(base);
    let faces = Arc::new(FakeFaceSwap::default());
    let lips = Arc::new(FakeLipSync::default());
    let speech = Arc::new(FakeSpeech::default());
    let objects = Arc::new(FakeObjects::default());
    let compositor = Arc::new(FakeCompositor::default());

    let ctx = Arc::new(PipelineContext {
        store: store.clone(),
        objects: objects.clone(),
        base_video: base.clone(),
        faceswap: faces.clone(),
        lipsync: lips.clone(),
        speech: speech.clone(),
        compositor: compositor.clone(),
        config,
    });

    Harness {
        store,
        base,
        faces,
        lips,
        speech,
        objects,
        compositor,
        pipeline: Pipeline::new(ctx),
    }
}

fn harness() -> Harness {
    harness_with(FakeBaseVideo::default(), fast_config())
}

fn seed_persona(store: &MemoryStore, owner: &str) {
    store.put_persona(
        owner,
        Persona {
            gender: Some(Gender::Female),
            face_kit_url: Some("https://faces/ref.png".into()),
            display_name: None,
        },
    );
}

fn basic_job(key: &str) -> Job {
    Job::new("user-1", "a knight", "a brave knight at dawn, cinematic", key)
}

fn narrated_job(key: &str) -> Job {
    let mut job = basic_job(key);
    job.options = Some(JobOptions {
        narration: Some(NarrationRequest {
            text: "a knight rides at dawn".into(),
            language: Some("en".into()),
            style: None,
            voice_profile: None,
            speed: Some(1.1),
        }),
        scene: None,
    });
    job
}

// =============================================================================
// Pipeline behavior
// =============================================================================

#[tokio::test]
async fn full_pipeline_without_narration() {
    let h = harness();
    seed_persona(&h.store, "user-1");
    let job = basic_job("key-1");
    let id = job.id.clone();
    h.store.seed_job(job);

    h.pipeline.run(&id).await.unwrap();

    let done = h.store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(
        done.assets.final_url.as_deref(),
        Some(format!("https://store/leadrole-final-{id}").as_str())
    );
    assert!(done.assets.lipsync_url.is_none());
    assert!(done.audio.tts_url.is_none());
    assert!(done.error.is_none());

    assert_eq!(
        h.store.status_log(&id),
        vec![
            JobStatus::Validating,
            JobStatus::GeneratingBase,
            JobStatus::UploadingBase,
            JobStatus::Faceswap,
            JobStatus::Watermarking,
            JobStatus::Done,
        ]
    );

    // watermarking consumed the face-swap output directly
    let inputs = h.compositor.inputs.lock().unwrap();
    assert_eq!(
        inputs[0].0,
        format!("https://store/leadrole-faceswap-{id}")
    );
    assert_eq!(inputs[0].1, "https://assets/watermark.png");

    assert_eq!(h.base.start_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.lips.start_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn narration_branch_runs_tts_and_lipsync() {
    let h = harness();
    seed_persona(&h.store, "user-1");
    let job = narrated_job("key-2");
    let id = job.id.clone();
    h.store.seed_job(job);

    h.pipeline.run(&id).await.unwrap();

    let done = h.store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(
        done.audio.tts_url.as_deref(),
        Some(format!("https://store/leadrole-tts-{id}").as_str())
    );
    assert_eq!(done.audio.voice_profile, Some(VoiceProfile::NarrationFemale));
    assert!(done.assets.lipsync_url.is_some());

    let log = h.store.status_log(&id);
    assert!(log.contains(&JobStatus::TtsGenerating));
    assert!(log.contains(&JobStatus::TtsDone));
    assert!(log.contains(&JobStatus::Lipsync));

    // the planner's speaking rate reached the synthesizer
    assert_eq!(*h.speech.last_rate.lock().unwrap(), Some(1.1));

    // watermarking consumed the lip-synced output
    let inputs = h.compositor.inputs.lock().unwrap();
    assert_eq!(
        inputs[0].0,
        format!("https://store/leadrole-lipsync-{id}")
    );
}

#[tokio::test]
async fn resume_from_faceswap_skips_base_generation() {
    let h = harness();
    seed_persona(&h.store, "user-1");
    let mut job = basic_job("key-3");
    job.resume_from = ResumePoint::Faceswap;
    job.assets.base_video_url = Some("https://store/leadrole-base-old".into());
    let id = job.id.clone();
    h.store.seed_job(job);

    h.pipeline.run(&id).await.unwrap();

    assert_eq!(h.base.start_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.faces.start_calls.load(Ordering::SeqCst), 1);

    let log = h.store.status_log(&id);
    assert!(!log.contains(&JobStatus::GeneratingBase));
    assert!(log.contains(&JobStatus::UploadingBase));
    assert_eq!(*log.last().unwrap(), JobStatus::Done);

    // the stored base was re-mirrored, not regenerated
    let mirrored = h.objects.mirrored.lock().unwrap();
    assert!(mirrored
        .iter()
        .any(|(url, _)| url == "https://store/leadrole-base-old"));
}

#[tokio::test]
async fn lipsync_failure_preserves_faceswap_and_resume_skips_it() {
    let h = harness();
    seed_persona(&h.store, "user-1");
    let job = narrated_job("key-4");
    let id = job.id.clone();
    h.store.seed_job(job);
    h.lips.fail.store(true, Ordering::SeqCst);

    let err = h.pipeline.run(&id).await.unwrap_err();
    assert!(matches!(err, PipelineError::LipsyncFailed { .. }));

    let failed = h.store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.assets.faceswap_url.is_some());
    assert!(failed.assets.final_url.is_none());
    assert!(failed.error.is_some());
    // the correlation id survived for diagnostics
    assert_eq!(
        failed.vendor_refs.transform.as_ref().unwrap().id,
        "pred-ls-1"
    );

    // resume from the lip-sync stage
    h.lips.fail.store(false, Ordering::SeqCst);
    let queue = Arc::new(FakeQueue::default());
    let gate = SubmissionGate::new(h.store.clone(), queue.clone(), true);
    gate.resume(&id, ResumePoint::Lipsync).await.unwrap();

    let resumed = h.store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(resumed.status, JobStatus::Queued);
    assert!(resumed.error.is_none());
    assert_eq!(*queue.enqueued.lock().unwrap(), vec![id.to_string()]);

    h.pipeline.run(&id).await.unwrap();

    let done = h.store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Done);
    // face swap, base generation, and speech were not re-invoked
    assert_eq!(h.faces.start_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.base.start_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.lips.start_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_face_reference_fails_the_job() {
    let h = harness();
    // no persona seeded
    let job = basic_job("key-5");
    let id = job.id.clone();
    h.store.seed_job(job);

    let err = h.pipeline.run(&id).await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingFaceReference));

    let failed = h.store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
}

#[tokio::test]
async fn missing_faceswap_public_url_blocks_lipsync() {
    let h = harness();
    seed_persona(&h.store, "user-1");
    let mut job = narrated_job("key-6");
    job.resume_from = ResumePoint::Lipsync;
    job.assets.base_video_url = Some("https://store/base.mp4".into());
    job.assets.faceswap_url = Some("https://store/fs.mp4".into());
    // faceswap_public_url never captured
    job.audio.tts_url = Some("https://store/tts.mp3".into());
    let id = job.id.clone();
    h.store.seed_job(job);

    let err = h.pipeline.run(&id).await.unwrap_err();
    assert!(matches!(err, PipelineError::FaceswapPublicUrlMissing));
    assert_eq!(h.faces.start_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn base_generation_timeout_carries_elapsed_and_vendor_ref() {
    let mut config = fast_config();
    config.base_poll = PollConfig::new(Duration::from_millis(2), Duration::from_millis(20));
    let h = harness_with(FakeBaseVideo::pending_forever(), config);
    seed_persona(&h.store, "user-1");
    let job = basic_job("key-7");
    let id = job.id.clone();
    h.store.seed_job(job);

    let err = h.pipeline.run(&id).await.unwrap_err();
    assert!(matches!(err, PipelineError::BaseGenerationTimeout { .. }));

    let failed = h.store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    // generation id survives for a future resume
    assert_eq!(
        failed.vendor_refs.base_generation_id.as_deref(),
        Some("gen-1")
    );
    let meta = failed.error.unwrap().meta.unwrap();
    assert!(meta.get("waited_secs").is_some());
}

#[tokio::test]
async fn progress_preview_is_checkpointed_before_completion() {
    let base = FakeBaseVideo::with_updates(vec![
        FakeBaseVideo::pending(Some("https://vendor/progress.mp4"), Some("https://vendor/frame.jpg")),
        FakeBaseVideo::succeeded(),
    ]);
    let h = harness_with(base, fast_config());
    seed_persona(&h.store, "user-1");
    let job = basic_job("key-8");
    let id = job.id.clone();
    h.store.seed_job(job);

    h.pipeline.run(&id).await.unwrap();

    let done = h.store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(
        done.assets.progress_video_url.as_deref(),
        Some("https://vendor/progress.mp4")
    );
    assert_eq!(
        done.assets.progress_thumb_url.as_deref(),
        Some("https://vendor/frame.jpg")
    );
}

#[tokio::test]
async fn infrastructure_failure_leaves_status_unchanged() {
    let inner = Arc::new(MemoryStore::new());
    seed_persona(&inner, "user-1");
    let job = basic_job("key-9");
    let id = job.id.clone();
    inner.seed_job(job);

    let flaky = Arc::new(FlakyStore {
        inner: inner.clone(),
        fail_merges: AtomicBool::new(true),
    });

    let ctx = Arc::new(PipelineContext {
        store: flaky,
        objects: Arc::new(FakeObjects::default()),
        base_video: Arc::new(FakeBaseVideo::default()),
        faceswap: Arc::new(FakeFaceSwap::default()),
        lipsync: Arc::new(FakeLipSync::default()),
        speech: Arc::new(FakeSpeech::default()),
        compositor: Arc::new(FakeCompositor::default()),
        config: fast_config(),
    });
    let pipeline = Pipeline::new(ctx);

    let err = pipeline.run(&id).await.unwrap_err();
    assert!(err.is_infrastructure());

    // nothing was written: the job is still queued, not failed
    let job = inner.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.error.is_none());
}

#[tokio::test]
async fn job_not_found_is_reported() {
    let h = harness();
    let err = h.pipeline.run(&JobId::from_string("ghost")).await.unwrap_err();
    assert!(matches!(err, PipelineError::JobNotFound(_)));
}

// =============================================================================
// Submission gate
// =============================================================================

fn submit_request(key: &str) -> SubmitRequest {
    SubmitRequest {
        idempotency_key: key.to_string(),
        owner_id: "user-1".to_string(),
        prompt: "a knight".to_string(),
        rendered_prompt: "a brave knight at dawn, cinematic".to_string(),
        video: VideoSpec::default(),
        ..Default::default()
    }
}

#[tokio::test]
async fn submit_deduplicates_by_idempotency_key() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(FakeQueue::default());
    let gate = SubmissionGate::new(store.clone(), queue.clone(), true);

    let first = gate.submit(submit_request("key-a")).await.unwrap();
    let second = gate.submit(submit_request("key-a")).await.unwrap();

    assert!(!first.reused);
    assert!(second.reused);
    assert_eq!(first.job_id, second.job_id);
    assert_eq!(store.job_count(), 1);
    assert_eq!(queue.enqueued.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_submissions_create_one_job() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(FakeQueue::default());
    let gate = Arc::new(SubmissionGate::new(store.clone(), queue.clone(), true));

    let (a, b) = tokio::join!(
        {
            let gate = gate.clone();
            async move { gate.submit(submit_request("key-b")).await }
        },
        {
            let gate = gate.clone();
            async move { gate.submit(submit_request("key-b")).await }
        }
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.job_id, b.job_id);
    assert_eq!(store.job_count(), 1);
    assert!(a.reused != b.reused, "exactly one submission creates");
}

#[tokio::test]
async fn submit_requires_idempotency_key() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(FakeQueue::default());
    let gate = SubmissionGate::new(store.clone(), queue.clone(), true);

    let err = gate.submit(submit_request("  ")).await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingIdempotencyKey));
    assert_eq!(store.job_count(), 0);
    assert!(queue.enqueued.lock().unwrap().is_empty());
}

#[tokio::test]
async fn strict_gate_rejects_over_cap_narration() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(FakeQueue::default());
    let gate = SubmissionGate::new(store.clone(), queue.clone(), true);

    let mut request = submit_request("key-c");
    let long_text = (0..40).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
    request.options = Some(JobOptions {
        narration: Some(NarrationRequest {
            text: long_text,
            language: Some("en".into()),
            ..Default::default()
        }),
        scene: None,
    });

    let err = gate.submit(request).await.unwrap_err();
    match err {
        PipelineError::NarrationTooLong {
            max_words,
            provided,
        } => {
            assert_eq!(max_words, 11);
            assert_eq!(provided, 40);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.job_count(), 0);
}

#[tokio::test]
async fn lenient_gate_trims_narration_and_plans_speed() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(FakeQueue::default());
    let gate = SubmissionGate::new(store.clone(), queue.clone(), false);

    let mut request = submit_request("key-d");
    let long_text = (0..40).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
    request.options = Some(JobOptions {
        narration: Some(NarrationRequest {
            text: long_text,
            language: Some("en".into()),
            ..Default::default()
        }),
        scene: None,
    });

    let receipt = gate.submit(request).await.unwrap();
    let job = store.get_job(&receipt.job_id).await.unwrap().unwrap();

    let plan = job.narration_plan.as_ref().unwrap();
    assert!(plan.trimmed);
    assert_eq!(plan.word_count, 11);
    assert_eq!(plan.max_words, 11);

    let narration = job.narration().unwrap();
    assert_eq!(narration.text.split_whitespace().count(), 11);
    assert_eq!(narration.speed, Some(plan.speaking_rate));
}

// =============================================================================
// Sweeper
// =============================================================================

#[tokio::test]
async fn sweeper_requeues_stranded_jobs_once() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(FakeQueue::default());

    let mut stranded = basic_job("key-e");
    stranded.updated_at = chrono::Utc::now() - chrono::Duration::minutes(30);
    let stranded_id = stranded.id.clone();
    store.seed_job(stranded);
    store.seed_job(basic_job("key-f")); // fresh, left alone

    let sweeper = QueuedJobSweeper::new(
        store.clone(),
        queue.clone(),
        Duration::from_secs(60),
        Duration::from_secs(600),
    );

    let requeued = sweeper.sweep_once().await.unwrap();
    assert_eq!(requeued, 1);
    assert_eq!(
        *queue.enqueued.lock().unwrap(),
        vec![stranded_id.to_string()]
    );

    // updated_at was bumped: the next cycle leaves it alone
    let again = sweeper.sweep_once().await.unwrap();
    assert_eq!(again, 0);
}
