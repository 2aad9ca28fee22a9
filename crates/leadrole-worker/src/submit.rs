//! Submission gate: dedup and enqueue in front of the orchestrator.
//!
//! At-most-one pipeline execution per idempotency key: a repeated key
//! returns the existing job id with `reused=true` and performs no further
//! work, regardless of client retry behavior. Record creation and enqueue
//! are not atomic; the sweeper re-enqueues jobs stranded in `queued`.

use std::sync::Arc;

use tracing::{info, warn};

use leadrole_models::{
    plan_narration, Job, JobId, JobOptions, JobStatus, PlanOptions, ResumePoint, VideoSpec,
};
use leadrole_queue::WorkQueue;
use leadrole_store::{JobPatch, RecordStore, StoreError};

use crate::error::{PipelineError, PipelineResult};

/// One inbound submission, already validated and prompt-expanded upstream.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub idempotency_key: String,
    pub owner_id: String,
    /// Prompt exactly as the caller typed it
    pub prompt: String,
    /// Prompt after persona/scene expansion
    pub rendered_prompt: String,
    pub video: VideoSpec,
    pub options: Option<JobOptions>,
    /// Advisory resume point for resubmissions
    pub resume_from: Option<ResumePoint>,
    /// Pre-supplied base video, if the caller already has one
    pub base_video_url: Option<String>,
    /// In-flight base generation to adopt instead of starting fresh
    pub base_generation_id: Option<String>,
}

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub job_id: JobId,
    pub reused: bool,
}

/// Dedup/enqueue logic in front of the pipeline.
pub struct SubmissionGate {
    store: Arc<dyn RecordStore>,
    queue: Arc<dyn WorkQueue>,
    strict_narration: bool,
}

impl SubmissionGate {
    pub fn new(
        store: Arc<dyn RecordStore>,
        queue: Arc<dyn WorkQueue>,
        strict_narration: bool,
    ) -> Self {
        Self {
            store,
            queue,
            strict_narration,
        }
    }

    /// Submit a job: dedup by idempotency key, plan narration, create the
    /// record, enqueue once.
    pub async fn submit(&self, request: SubmitRequest) -> PipelineResult<SubmitReceipt> {
        let key = request.idempotency_key.trim();
        if key.is_empty() {
            return Err(PipelineError::MissingIdempotencyKey);
        }

        if let Some(existing) = self.store.find_by_idempotency_key(key).await? {
            info!(job_id = %existing.id, key, "Reusing job for repeated idempotency key");
            return Ok(SubmitReceipt {
                job_id: existing.id,
                reused: true,
            });
        }

        let job = self.build_job(&request, key)?;
        let job_id = job.id.clone();

        match self.store.create_job(&job).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => {
                // Lost a race with a concurrent duplicate; hand back the winner.
                let winner = self
                    .store
                    .find_by_idempotency_key(key)
                    .await?
                    .ok_or_else(|| StoreError::already_exists(key.to_string()))?;
                info!(job_id = %winner.id, key, "Concurrent duplicate resolved to existing job");
                return Ok(SubmitReceipt {
                    job_id: winner.id,
                    reused: true,
                });
            }
            Err(e) => return Err(e.into()),
        }

        // Not atomic with the create above: a crash here leaves the job
        // `queued` for the sweeper to pick up.
        self.queue.enqueue(&job_id).await?;

        info!(job_id = %job_id, key, "Job created and enqueued");
        Ok(SubmitReceipt {
            job_id,
            reused: false,
        })
    }

    /// Re-enqueue an existing job from an advisory resume point.
    pub async fn resume(&self, job_id: &JobId, resume_from: ResumePoint) -> PipelineResult<()> {
        if self.store.get_job(job_id).await?.is_none() {
            return Err(PipelineError::JobNotFound(job_id.clone()));
        }

        let patch = JobPatch {
            status: Some(JobStatus::Queued),
            resume_from: Some(resume_from),
            clear_error: true,
            ..Default::default()
        };
        self.store.merge_job(job_id, patch).await?;
        self.queue.enqueue(job_id).await?;

        info!(job_id = %job_id, resume_from = %resume_from, "Job re-enqueued for resume");
        Ok(())
    }

    fn build_job(&self, request: &SubmitRequest, key: &str) -> PipelineResult<Job> {
        let mut job = Job::new(
            request.owner_id.clone(),
            request.prompt.clone(),
            request.rendered_prompt.clone(),
            key,
        );
        job.video = request.video;
        job.resume_from = request.resume_from.unwrap_or_default();
        job.base_video_url = request.base_video_url.clone();
        job.vendor_refs.base_generation_id = request.base_generation_id.clone();

        let mut options = request.options.clone();

        // Fit the narration to the clip duration now, so the pipeline
        // consumes a script that is already speakable in the time box.
        if let Some(narration) = options.as_mut().and_then(|o| o.narration.as_mut()) {
            if !narration.text.trim().is_empty() {
                let plan = plan_narration(
                    &narration.text,
                    request.video.duration,
                    narration.language.as_deref().unwrap_or("en"),
                    &PlanOptions {
                        strict: self.strict_narration,
                        ..PlanOptions::default()
                    },
                )?;
                if plan.trimmed {
                    warn!(
                        key,
                        provided = narration.text.split_whitespace().count(),
                        kept = plan.word_count,
                        "Narration trimmed to fit clip duration"
                    );
                }
                narration.text = plan.text.clone();
                narration.speed = Some(plan.speaking_rate);
                job.narration_plan = Some(plan);
            }
        }
        job.options = options;

        Ok(job)
    }
}
