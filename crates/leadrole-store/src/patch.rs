//! Partial-field job updates (checkpoints).
//!
//! Every stage of the pipeline persists its effect as a `JobPatch`: only
//! the fields a stage actually produced, written with a field mask so
//! nothing else on the record is disturbed.

use chrono::{DateTime, Utc};
use serde_json::json;

use leadrole_models::{
    Job, JobError, JobStatus, NarrationPlan, ResumePoint, TransformRef, VoiceProfile,
};

/// A partial-field update to one job record.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub resume_from: Option<ResumePoint>,
    pub error: Option<JobError>,
    /// Clear a stale error on resubmission
    pub clear_error: bool,
    pub narration_plan: Option<NarrationPlan>,

    pub base_video_url: Option<String>,
    pub base_store_id: Option<String>,
    pub faceswap_url: Option<String>,
    pub faceswap_store_id: Option<String>,
    pub faceswap_public_url: Option<String>,
    pub lipsync_url: Option<String>,
    pub lipsync_store_id: Option<String>,
    pub progress_video_url: Option<String>,
    pub progress_thumb_url: Option<String>,
    pub final_url: Option<String>,
    pub final_id: Option<String>,

    pub tts_url: Option<String>,
    pub voice_profile: Option<VoiceProfile>,

    pub base_generation_id: Option<String>,
    pub transform_ref: Option<TransformRef>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn error(mut self, error: JobError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_values(Utc::now())
            .iter()
            .all(|(path, _)| path == "updated_at")
    }

    /// Flatten into `(dotted path, value)` pairs; the paths double as the
    /// update mask. `updated_at` is always included so every checkpoint
    /// bumps the record's clock.
    pub fn leaf_values(&self, updated_at: DateTime<Utc>) -> Vec<(String, serde_json::Value)> {
        let mut out: Vec<(String, serde_json::Value)> = Vec::new();

        let mut push = |path: &str, value: serde_json::Value| {
            out.push((path.to_string(), value));
        };

        if let Some(status) = self.status {
            push("status", json!(status));
        }
        if let Some(resume_from) = self.resume_from {
            push("resume_from", json!(resume_from));
        }
        if let Some(error) = &self.error {
            push("error", json!(error));
        } else if self.clear_error {
            push("error", serde_json::Value::Null);
        }
        if let Some(plan) = &self.narration_plan {
            push("narration_plan", json!(plan));
        }

        if let Some(v) = &self.base_video_url {
            push("assets.base_video_url", json!(v));
        }
        if let Some(v) = &self.base_store_id {
            push("assets.base_store_id", json!(v));
        }
        if let Some(v) = &self.faceswap_url {
            push("assets.faceswap_url", json!(v));
        }
        if let Some(v) = &self.faceswap_store_id {
            push("assets.faceswap_store_id", json!(v));
        }
        if let Some(v) = &self.faceswap_public_url {
            push("assets.faceswap_public_url", json!(v));
        }
        if let Some(v) = &self.lipsync_url {
            push("assets.lipsync_url", json!(v));
        }
        if let Some(v) = &self.lipsync_store_id {
            push("assets.lipsync_store_id", json!(v));
        }
        if let Some(v) = &self.progress_video_url {
            push("assets.progress_video_url", json!(v));
        }
        if let Some(v) = &self.progress_thumb_url {
            push("assets.progress_thumb_url", json!(v));
        }
        if let Some(v) = &self.final_url {
            push("assets.final_url", json!(v));
        }
        if let Some(v) = &self.final_id {
            push("assets.final_id", json!(v));
        }

        if let Some(v) = &self.tts_url {
            push("audio.tts_url", json!(v));
        }
        if let Some(v) = &self.voice_profile {
            push("audio.voice_profile", json!(v));
        }

        if let Some(v) = &self.base_generation_id {
            push("vendor_refs.base_generation_id", json!(v));
        }
        if let Some(v) = &self.transform_ref {
            push("vendor_refs.transform", json!(v));
        }

        push("updated_at", json!(updated_at));
        out
    }

    /// Apply the patch to an in-memory job: the reference semantics the
    /// Firestore field-mask merge must match.
    pub fn apply_to(&self, job: &mut Job, updated_at: DateTime<Utc>) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(resume_from) = self.resume_from {
            job.resume_from = resume_from;
        }
        if let Some(error) = &self.error {
            job.error = Some(error.clone());
        } else if self.clear_error {
            job.error = None;
        }
        if let Some(plan) = &self.narration_plan {
            job.narration_plan = Some(plan.clone());
        }

        let assets = &mut job.assets;
        macro_rules! set_asset {
            ($field:ident) => {
                if let Some(v) = &self.$field {
                    assets.$field = Some(v.clone());
                }
            };
        }
        set_asset!(base_video_url);
        set_asset!(base_store_id);
        set_asset!(faceswap_url);
        set_asset!(faceswap_store_id);
        set_asset!(faceswap_public_url);
        set_asset!(lipsync_url);
        set_asset!(lipsync_store_id);
        set_asset!(progress_video_url);
        set_asset!(progress_thumb_url);
        set_asset!(final_url);
        set_asset!(final_id);

        if let Some(v) = &self.tts_url {
            job.audio.tts_url = Some(v.clone());
        }
        if let Some(v) = self.voice_profile {
            job.audio.voice_profile = Some(v);
        }

        if let Some(v) = &self.base_generation_id {
            job.vendor_refs.base_generation_id = Some(v.clone());
        }
        if let Some(v) = &self.transform_ref {
            job.vendor_refs.transform = Some(v.clone());
        }

        job.updated_at = updated_at;
    }
}
