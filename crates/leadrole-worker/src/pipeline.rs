//! Pipeline orchestration: drive one job through the ordered stages.
//!
//! An explicit state machine: each stage handler checkpoints its effect as
//! a partial-field merge before the next stage starts, so a crash,
//! redeploy, or explicit resume picks up at the next unfinished stage
//! instead of from scratch. The advisory `resume_from` point and
//! asset-presence checks are independent skip conditions.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, info, warn};

use leadrole_models::{
    Job, JobId, JobStatus, NarrationRequest, NarrationStyle, TransformRef, VoiceProfile,
};
use leadrole_providers::{poll_until_terminal, ProviderError};
use leadrole_storage::ObjectStore;
use leadrole_store::{JobPatch, RecordStore};

use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::vendors::{
    BaseVideoProvider, Compositor, FaceSwapProvider, LipSyncProvider, SpeechProvider,
    TransformHandle, TransformUpdate, VendorState,
};

/// Everything a pipeline run needs, injected once at startup.
pub struct PipelineContext {
    pub store: Arc<dyn RecordStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub base_video: Arc<dyn BaseVideoProvider>,
    pub faceswap: Arc<dyn FaceSwapProvider>,
    pub lipsync: Arc<dyn LipSyncProvider>,
    pub speech: Arc<dyn SpeechProvider>,
    pub compositor: Arc<dyn Compositor>,
    pub config: WorkerConfig,
}

/// Ordered pipeline stages after validation. `next` is encoded by each
/// handler's return value, which makes inserting a stage a local change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    BaseVideo,
    UploadBase,
    FaceSwap,
    Narration,
    Watermark,
    Finalize,
}

/// What the watermarking stage consumes, decided once narration presence
/// is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalCandidate {
    /// No narration: the face-swapped video goes straight to watermarking
    Direct(String),
    /// Narrated: the lip-synced video is the candidate
    Narrated {
        tts_url: String,
        lipsync_url: String,
    },
}

impl FinalCandidate {
    pub fn url(&self) -> &str {
        match self {
            FinalCandidate::Direct(url) => url,
            FinalCandidate::Narrated { lipsync_url, .. } => lipsync_url,
        }
    }
}

/// Mutable state threaded through one run.
struct RunState {
    job: Job,
    /// URL handed to the face-swap vendor as the transform target
    base_target_url: Option<String>,
    final_candidate: Option<FinalCandidate>,
    watermarked: Option<Vec<u8>>,
}

/// The pipeline orchestrator.
#[derive(Clone)]
pub struct Pipeline {
    ctx: Arc<PipelineContext>,
}

impl Pipeline {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    /// Run the pipeline for one job id.
    ///
    /// Domain failures are persisted onto the job (`failed` + reason) and
    /// returned; infrastructure failures are returned with the job record
    /// untouched so queue redelivery can retry from the last checkpoint.
    pub async fn run(&self, job_id: &JobId) -> PipelineResult<()> {
        info!(job_id = %job_id, "Starting pipeline run");

        match self.execute(job_id).await {
            Ok(()) => {
                info!(job_id = %job_id, "Pipeline run complete");
                Ok(())
            }
            Err(e) if e.is_infrastructure() => {
                warn!(job_id = %job_id, error = %e, "Infrastructure failure; leaving job untouched");
                Err(e)
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Pipeline run failed");
                let patch = JobPatch::new()
                    .status(JobStatus::Failed)
                    .error(e.job_error());
                if let Err(merge_err) = self.ctx.store.merge_job(job_id, patch).await {
                    warn!(job_id = %job_id, error = %merge_err, "Could not persist failure");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, job_id: &JobId) -> PipelineResult<()> {
        let mut state = self.validate(job_id).await?;

        let mut stage = Stage::BaseVideo;
        loop {
            debug!(job_id = %state.job.id, stage = ?stage, "Entering stage");
            let next = match stage {
                Stage::BaseVideo => self.base_video(&mut state).await?,
                Stage::UploadBase => self.upload_base(&mut state).await?,
                Stage::FaceSwap => self.face_swap(&mut state).await?,
                Stage::Narration => self.narration(&mut state).await?,
                Stage::Watermark => self.watermark(&mut state).await?,
                Stage::Finalize => self.finalize(&mut state).await?,
            };
            match next {
                Some(next_stage) => stage = next_stage,
                None => return Ok(()),
            }
        }
    }

    /// Merge a checkpoint into the store and mirror it onto the in-memory
    /// record so later stages see it without a re-read.
    async fn checkpoint(&self, state: &mut RunState, patch: JobPatch) -> PipelineResult<()> {
        self.ctx.store.merge_job(&state.job.id, patch.clone()).await?;
        patch.apply_to(&mut state.job, Utc::now());
        Ok(())
    }

    // =========================================================================
    // Stage handlers
    // =========================================================================

    async fn validate(&self, job_id: &JobId) -> PipelineResult<RunState> {
        let job = self
            .ctx
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| PipelineError::JobNotFound(job_id.clone()))?;

        if job.rendered_prompt.trim().is_empty() {
            return Err(PipelineError::MissingPrompt);
        }

        let mut state = RunState {
            job,
            base_target_url: None,
            final_candidate: None,
            watermarked: None,
        };
        self.checkpoint(&mut state, JobPatch::new().status(JobStatus::Validating))
            .await?;
        Ok(state)
    }

    async fn base_video(&self, state: &mut RunState) -> PipelineResult<Option<Stage>> {
        if let Some(url) = state.job.known_base_video_url() {
            debug!(job_id = %state.job.id, "Base video already present; skipping generation");
            state.base_target_url = Some(url.to_string());
            return Ok(Some(Stage::UploadBase));
        }

        self.checkpoint(state, JobPatch::new().status(JobStatus::GeneratingBase))
            .await?;

        // A resume with an in-flight generation re-polls it instead of
        // paying for a fresh one.
        let generation_id = match (
            state.job.resume_from.is_resume(),
            state.job.vendor_refs.base_generation_id.clone(),
        ) {
            (true, Some(existing)) => existing,
            _ => {
                self.ctx
                    .base_video
                    .start(&state.job.rendered_prompt, &state.job.video)
                    .await?
            }
        };

        let mut patch = JobPatch::new();
        patch.base_generation_id = Some(generation_id.clone());
        self.checkpoint(state, patch).await?;

        let provider = Arc::clone(&self.ctx.base_video);
        let store = Arc::clone(&self.ctx.store);
        let job_id = state.job.id.clone();
        // last (progress clip, preview frame) already checkpointed
        let seen: Arc<Mutex<(Option<String>, Option<String>)>> =
            Arc::new(Mutex::new((None, None)));

        let outcome = poll_until_terminal(&self.ctx.config.base_poll, || {
            let provider = Arc::clone(&provider);
            let store = Arc::clone(&store);
            let job_id = job_id.clone();
            let generation_id = generation_id.clone();
            let seen = Arc::clone(&seen);
            async move {
                let update = provider.poll(&generation_id).await?;

                // Best-effort progress capture: a client can show a preview
                // before the stage completes. Never blocks or fails the run.
                let progress = {
                    let mut last = seen.lock().unwrap();
                    let changed_clip = update.progress_video_url.is_some()
                        && update.progress_video_url != last.0;
                    let changed_frame =
                        update.preview_image_url.is_some() && update.preview_image_url != last.1;
                    if changed_clip || changed_frame {
                        last.0 = update.progress_video_url.clone().or(last.0.take());
                        last.1 = update.preview_image_url.clone().or(last.1.take());
                        Some((last.0.clone(), last.1.clone()))
                    } else {
                        None
                    }
                };
                if let Some((clip, frame)) = progress {
                    let mut patch = JobPatch::new();
                    patch.progress_video_url = clip;
                    patch.progress_thumb_url = frame;
                    store.merge_job(&job_id, patch).await.ok();
                }

                Ok(update.state.is_terminal().then_some(update))
            }
        })
        .await;

        let update = match outcome {
            Ok(update) => update,
            Err(ProviderError::PollTimeout { waited_secs }) => {
                return Err(PipelineError::BaseGenerationTimeout { waited_secs });
            }
            Err(e) => return Err(e.into()),
        };

        if update.state != VendorState::Succeeded {
            return Err(PipelineError::BaseGenerationFailed {
                reason: update
                    .failure_reason
                    .unwrap_or_else(|| update.state.as_str().to_string()),
            });
        }

        let video_url = update.video_url.ok_or(PipelineError::BaseGenerationFailed {
            reason: "completed with no video asset".to_string(),
        })?;

        state.base_target_url = Some(video_url);
        Ok(Some(Stage::UploadBase))
    }

    async fn upload_base(&self, state: &mut RunState) -> PipelineResult<Option<Stage>> {
        self.checkpoint(state, JobPatch::new().status(JobStatus::UploadingBase))
            .await?;

        let source = state
            .base_target_url
            .clone()
            .ok_or(PipelineError::BaseGenerationFailed {
                reason: "no base video to mirror".to_string(),
            })?;

        let key = format!("leadrole-base-{}", state.job.id);
        let stored = self
            .ctx
            .objects
            .mirror_from_url(&source, &key, "video/mp4")
            .await?;

        let mut patch = JobPatch::new();
        patch.base_video_url = Some(stored.url);
        patch.base_store_id = Some(stored.id);
        self.checkpoint(state, patch).await?;

        Ok(Some(Stage::FaceSwap))
    }

    async fn face_swap(&self, state: &mut RunState) -> PipelineResult<Option<Stage>> {
        let needed = state.job.assets.faceswap_url.is_none()
            || state.job.resume_from.forces_faceswap();
        if !needed {
            debug!(job_id = %state.job.id, "Face-swap asset present; skipping");
            return Ok(Some(Stage::Narration));
        }

        self.checkpoint(state, JobPatch::new().status(JobStatus::Faceswap))
            .await?;

        let persona = self.ctx.store.fetch_persona(&state.job.owner_id).await?;
        let face_url = persona
            .as_ref()
            .and_then(|p| p.face_kit_url.clone())
            .ok_or(PipelineError::MissingFaceReference)?;

        let target = state
            .base_target_url
            .clone()
            .or_else(|| state.job.known_base_video_url().map(str::to_string))
            .ok_or(PipelineError::FaceswapAssetMissing)?;

        let handle = self.ctx.faceswap.start(&face_url, &target).await?;
        self.record_transform_ref(state, &handle).await?;

        let provider = Arc::clone(&self.ctx.faceswap);
        let update = self
            .poll_transform(&handle, move |h| {
                let provider = Arc::clone(&provider);
                async move { provider.poll(&h).await }
            })
            .await
            .map_err(|e| match e {
                PipelineError::Provider(ProviderError::PollTimeout { waited_secs }) => {
                    PipelineError::FaceswapFailed {
                        id: handle.id.clone(),
                        reason: format!("timed out after {}s", waited_secs),
                    }
                }
                other => other,
            })?;

        if update.state != VendorState::Succeeded {
            return Err(PipelineError::FaceswapFailed {
                id: handle.id.clone(),
                reason: update.state.as_str().to_string(),
            });
        }
        let public_url = update.output_url.ok_or(PipelineError::FaceswapFailed {
            id: handle.id.clone(),
            reason: "empty output".to_string(),
        })?;

        let key = format!("leadrole-faceswap-{}", state.job.id);
        let stored = self
            .ctx
            .objects
            .mirror_from_url(&public_url, &key, "video/mp4")
            .await?;

        let mut patch = JobPatch::new();
        patch.faceswap_url = Some(stored.url);
        patch.faceswap_store_id = Some(stored.id);
        patch.faceswap_public_url = Some(public_url);
        self.checkpoint(state, patch).await?;

        Ok(Some(Stage::Narration))
    }

    async fn narration(&self, state: &mut RunState) -> PipelineResult<Option<Stage>> {
        let Some(narration) = state.job.narration().cloned() else {
            let faceswap_url = state
                .job
                .assets
                .faceswap_url
                .clone()
                .ok_or(PipelineError::FaceswapAssetMissing)?;
            state.final_candidate = Some(FinalCandidate::Direct(faceswap_url));
            return Ok(Some(Stage::Watermark));
        };

        let tts_url = self.synthesize_narration(state, &narration).await?;
        let lipsync_url = self.lip_sync(state, &tts_url).await?;

        state.final_candidate = Some(FinalCandidate::Narrated {
            tts_url,
            lipsync_url,
        });
        Ok(Some(Stage::Watermark))
    }

    async fn synthesize_narration(
        &self,
        state: &mut RunState,
        narration: &NarrationRequest,
    ) -> PipelineResult<String> {
        let rerun = state.job.audio.tts_url.is_none() || state.job.resume_from.forces_tts();
        if !rerun {
            debug!(job_id = %state.job.id, "Narration audio present; skipping synthesis");
            return state
                .job
                .audio
                .tts_url
                .clone()
                .ok_or(PipelineError::SpeechSynthesisFailed("audio URL lost".into()));
        }

        self.checkpoint(state, JobPatch::new().status(JobStatus::TtsGenerating))
            .await?;

        let profile = match narration.voice_profile.as_deref() {
            Some(explicit) => explicit.parse::<VoiceProfile>().ok(),
            None => None,
        };
        let profile = match profile {
            Some(explicit) => explicit,
            None => {
                let persona = self.ctx.store.fetch_persona(&state.job.owner_id).await?;
                let gender = persona
                    .as_ref()
                    .map(|p| p.voice_gender())
                    .unwrap_or(leadrole_models::Gender::Male);
                let style = NarrationStyle::from_request(
                    narration.style.as_deref(),
                    narration.voice_profile.as_deref(),
                );
                VoiceProfile::resolve(gender, style)
            }
        };

        let speaking_rate = narration.speed.unwrap_or(1.0);
        let audio = self
            .ctx
            .speech
            .synthesize(&narration.text, profile, speaking_rate)
            .await
            .map_err(|e| PipelineError::SpeechSynthesisFailed(e.to_string()))?;

        let key = format!("leadrole-tts-{}", state.job.id);
        let stored = self.ctx.objects.put_bytes(audio, &key, "audio/mpeg").await?;

        let mut patch = JobPatch::new().status(JobStatus::TtsDone);
        patch.tts_url = Some(stored.url.clone());
        patch.voice_profile = Some(profile);
        self.checkpoint(state, patch).await?;

        Ok(stored.url)
    }

    async fn lip_sync(&self, state: &mut RunState, tts_url: &str) -> PipelineResult<String> {
        let rerun =
            state.job.assets.lipsync_url.is_none() || state.job.resume_from.forces_lipsync();
        if !rerun {
            debug!(job_id = %state.job.id, "Lip-sync asset present; skipping");
            return state
                .job
                .assets
                .lipsync_url
                .clone()
                .ok_or(PipelineError::FaceswapAssetMissing);
        }

        let public_url = state
            .job
            .assets
            .faceswap_public_url
            .clone()
            .ok_or(PipelineError::FaceswapPublicUrlMissing)?;

        self.checkpoint(state, JobPatch::new().status(JobStatus::Lipsync))
            .await?;

        let handle = self.ctx.lipsync.start(&public_url, tts_url).await?;
        self.record_transform_ref(state, &handle).await?;

        let provider = Arc::clone(&self.ctx.lipsync);
        let update = self
            .poll_transform(&handle, move |h| {
                let provider = Arc::clone(&provider);
                async move { provider.poll(&h).await }
            })
            .await
            .map_err(|e| match e {
                PipelineError::Provider(ProviderError::PollTimeout { waited_secs }) => {
                    PipelineError::LipsyncFailed {
                        id: handle.id.clone(),
                        reason: format!("timed out after {}s", waited_secs),
                    }
                }
                other => other,
            })?;

        if update.state != VendorState::Succeeded {
            return Err(PipelineError::LipsyncFailed {
                id: handle.id.clone(),
                reason: update.state.as_str().to_string(),
            });
        }
        let output_url = update.output_url.ok_or(PipelineError::LipsyncFailed {
            id: handle.id.clone(),
            reason: "empty output".to_string(),
        })?;

        let key = format!("leadrole-lipsync-{}", state.job.id);
        let stored = self
            .ctx
            .objects
            .mirror_from_url(&output_url, &key, "video/mp4")
            .await?;

        let mut patch = JobPatch::new();
        patch.lipsync_url = Some(stored.url.clone());
        patch.lipsync_store_id = Some(stored.id);
        self.checkpoint(state, patch).await?;

        Ok(stored.url)
    }

    async fn watermark(&self, state: &mut RunState) -> PipelineResult<Option<Stage>> {
        self.checkpoint(state, JobPatch::new().status(JobStatus::Watermarking))
            .await?;

        let candidate = state
            .final_candidate
            .as_ref()
            .ok_or(PipelineError::FaceswapAssetMissing)?;

        let bytes = self
            .ctx
            .compositor
            .composite(candidate.url(), &self.ctx.config.watermark_url)
            .await?;

        state.watermarked = Some(bytes);
        Ok(Some(Stage::Finalize))
    }

    async fn finalize(&self, state: &mut RunState) -> PipelineResult<Option<Stage>> {
        let bytes = state
            .watermarked
            .take()
            .ok_or(PipelineError::CompositingFailed("no composited buffer".into()))?;

        let key = format!("leadrole-final-{}", state.job.id);
        let stored = self.ctx.objects.put_bytes(bytes, &key, "video/mp4").await?;

        // Final asset and terminal status land in one checkpoint, so
        // `assets.final_url` is set exactly when status reads `done`.
        let mut patch = JobPatch::new().status(JobStatus::Done);
        patch.final_url = Some(stored.url);
        patch.final_id = Some(stored.id);
        patch.clear_error = true;
        self.checkpoint(state, patch).await?;

        Ok(None)
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    async fn record_transform_ref(
        &self,
        state: &mut RunState,
        handle: &TransformHandle,
    ) -> PipelineResult<()> {
        let mut patch = JobPatch::new();
        patch.transform_ref = Some(TransformRef {
            id: handle.id.clone(),
            poll_url: handle.poll_url.clone(),
            web_url: handle.web_url.clone(),
        });
        self.checkpoint(state, patch).await
    }

    /// Shared poll loop for both transform vendors: poll the handle to a
    /// terminal state under the configured cadence and wall-clock bound.
    async fn poll_transform<F, Fut>(
        &self,
        handle: &TransformHandle,
        poll: F,
    ) -> PipelineResult<TransformUpdate>
    where
        F: Fn(TransformHandle) -> Fut,
        Fut: std::future::Future<Output = leadrole_providers::ProviderResult<TransformUpdate>>,
    {
        let update = poll_until_terminal(&self.ctx.config.transform_poll, || {
            let poll_once = poll(handle.clone());
            async move {
                let update = poll_once.await?;
                Ok(update.state.is_terminal().then_some(update))
            }
        })
        .await?;
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_candidate_url() {
        let direct = FinalCandidate::Direct("https://s/fs.mp4".into());
        assert_eq!(direct.url(), "https://s/fs.mp4");

        let narrated = FinalCandidate::Narrated {
            tts_url: "https://s/tts.mp3".into(),
            lipsync_url: "https://s/ls.mp4".into(),
        };
        assert_eq!(narrated.url(), "https://s/ls.mp4");
    }
}
