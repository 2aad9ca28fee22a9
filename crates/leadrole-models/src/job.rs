//! Job record definitions for the generation pipeline.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{JobStatus, NarrationPlan, ResumePoint, VideoSpec, VoiceProfile};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Narration requested for a job. The text and speed are rewritten from the
/// narration plan at submission time, so the pipeline consumes them as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrationRequest {
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Free-form delivery hint ("storytelling", "calm", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    /// Explicit profile name; overrides gender/style resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_profile: Option<String>,

    /// Synthesizer rate multiplier from the narration plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Optional knobs supplied at submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration: Option<NarrationRequest>,

    /// Scene hint folded into the rendered prompt by the prompt builder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
}

/// Named URLs produced by pipeline stages.
///
/// Stored assets point at durable storage; `*_public_url` is the vendor's
/// own fetchable result, needed as input to downstream transforms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobAssets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_store_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub faceswap_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faceswap_store_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faceswap_public_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lipsync_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lipsync_store_id: Option<String>,

    /// Best-effort preview captured while base generation is in flight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_thumb_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_id: Option<String>,
}

/// Synthesized narration audio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobAudio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_profile: Option<VoiceProfile>,
}

/// Correlation handle for an in-flight or failed transform prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransformRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}

/// Opaque vendor correlation ids, kept for diagnostics and resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VendorRefs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_generation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformRef>,
}

/// Last failure reason persisted on the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobError {
    pub message: String,
    /// Machine-readable detail (e.g. word-count caps) for client messaging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            meta: None,
        }
    }

    pub fn with_meta(message: impl Into<String>, meta: serde_json::Value) -> Self {
        Self {
            message: message.into(),
            meta: Some(meta),
        }
    }
}

/// The unit of work: one persona-to-video render.
///
/// Created by the submission gate, mutated exclusively by the pipeline
/// orchestrator through partial-field merges, never deleted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,

    pub owner_id: String,

    /// Prompt exactly as submitted
    pub original_prompt: String,

    /// Prompt after persona/scene expansion; what the base vendor receives
    pub rendered_prompt: String,

    #[serde(default)]
    pub video: VideoSpec,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<JobOptions>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration_plan: Option<NarrationPlan>,

    #[serde(default)]
    pub status: JobStatus,

    #[serde(default)]
    pub resume_from: ResumePoint,

    /// Caller-supplied token; unique among non-duplicate submissions
    pub idempotency_key: String,

    /// Pre-supplied base video, if the caller already has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_video_url: Option<String>,

    #[serde(default)]
    pub assets: JobAssets,

    #[serde(default)]
    pub audio: JobAudio,

    #[serde(default)]
    pub vendor_refs: VendorRefs,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(
        owner_id: impl Into<String>,
        original_prompt: impl Into<String>,
        rendered_prompt: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            owner_id: owner_id.into(),
            original_prompt: original_prompt.into(),
            rendered_prompt: rendered_prompt.into(),
            video: VideoSpec::default(),
            options: None,
            narration_plan: None,
            status: JobStatus::Queued,
            resume_from: ResumePoint::Auto,
            idempotency_key: idempotency_key.into(),
            base_video_url: None,
            assets: JobAssets::default(),
            audio: JobAudio::default(),
            vendor_refs: VendorRefs::default(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The narration request, if one with non-empty text was supplied.
    pub fn narration(&self) -> Option<&NarrationRequest> {
        self.options
            .as_ref()
            .and_then(|o| o.narration.as_ref())
            .filter(|n| !n.text.trim().is_empty())
    }

    /// Any usable base video URL: a caller-supplied one, or one already
    /// mirrored into durable storage by a previous run.
    pub fn known_base_video_url(&self) -> Option<&str> {
        self.base_video_url
            .as_deref()
            .or(self.assets.base_video_url.as_deref())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_defaults() {
        let job = Job::new("user-1", "a knight", "a brave knight, 9:16", "key-1");
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.resume_from, ResumePoint::Auto);
        assert!(job.assets.final_url.is_none());
        assert!(job.narration().is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_narration_requires_non_empty_text() {
        let mut job = Job::new("user-1", "p", "p", "key-1");
        job.options = Some(JobOptions {
            narration: Some(NarrationRequest {
                text: "   ".to_string(),
                ..Default::default()
            }),
            scene: None,
        });
        assert!(job.narration().is_none());

        job.options.as_mut().unwrap().narration.as_mut().unwrap().text = "hello world".into();
        assert_eq!(job.narration().unwrap().text, "hello world");
    }

    #[test]
    fn test_known_base_video_prefers_supplied_url() {
        let mut job = Job::new("user-1", "p", "p", "key-1");
        assert!(job.known_base_video_url().is_none());

        job.assets.base_video_url = Some("https://store/base.mp4".into());
        assert_eq!(job.known_base_video_url(), Some("https://store/base.mp4"));

        job.base_video_url = Some("https://cdn/supplied.mp4".into());
        assert_eq!(job.known_base_video_url(), Some("https://cdn/supplied.mp4"));
    }

    #[test]
    fn test_job_serde_round_trip() {
        let mut job = Job::new("user-1", "p", "rendered p", "key-1");
        job.assets.faceswap_url = Some("https://store/fs.mp4".into());
        job.audio.voice_profile = Some(VoiceProfile::StoryFemale);

        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }
}
