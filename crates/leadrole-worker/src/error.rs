//! Pipeline error taxonomy.
//!
//! Three families matter to the orchestrator:
//! - input/precondition/provider failures mark the job `failed` with a
//!   persisted reason and are retried only by explicit resubmission;
//! - infrastructure failures (record store, queue) propagate without
//!   touching the job so queue redelivery retries from the last checkpoint.

use serde_json::json;
use thiserror::Error;

use leadrole_media::MediaError;
use leadrole_models::{JobError, JobId};
use leadrole_providers::ProviderError;
use leadrole_queue::QueueError;
use leadrole_storage::StorageError;
use leadrole_store::StoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    // --- input errors: rejected before any stage runs ---
    #[error("missing idempotency key")]
    MissingIdempotencyKey,

    #[error("narration too long: {provided} words exceeds the cap of {max_words}")]
    NarrationTooLong { max_words: usize, provided: usize },

    // --- validation / precondition errors ---
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("job has no renderable prompt")]
    MissingPrompt,

    #[error("persona has no face reference")]
    MissingFaceReference,

    #[error("face-swap asset missing; nothing to hand to the next stage")]
    FaceswapAssetMissing,

    #[error("face-swap public URL was never captured; lip-sync has no input")]
    FaceswapPublicUrlMissing,

    // --- provider failures ---
    #[error("base generation timed out after {waited_secs}s")]
    BaseGenerationTimeout { waited_secs: u64 },

    #[error("base generation failed: {reason}")]
    BaseGenerationFailed { reason: String },

    #[error("face swap failed ({id}): {reason}")]
    FaceswapFailed { id: String, reason: String },

    #[error("lip sync failed ({id}): {reason}")]
    LipsyncFailed { id: String, reason: String },

    #[error("speech synthesis failed: {0}")]
    SpeechSynthesisFailed(String),

    #[error("could not fetch source asset: {0}")]
    AssetDownloadFailed(String),

    #[error("watermark asset unusable: {0}")]
    WatermarkAssetInvalid(String),

    #[error("watermark compositing failed: {0}")]
    CompositingFailed(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("object store error: {0}")]
    Storage(#[from] StorageError),

    // --- infrastructure errors: job status left unchanged ---
    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

impl PipelineError {
    /// Infrastructure failures are never written onto the job; the queue's
    /// redelivery retries the run from its last checkpoint instead.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, PipelineError::Store(_) | PipelineError::Queue(_))
    }

    /// The persisted failure reason, with machine-readable metadata where a
    /// client can act on it.
    pub fn job_error(&self) -> JobError {
        match self {
            PipelineError::NarrationTooLong {
                max_words,
                provided,
            } => JobError::with_meta(
                self.to_string(),
                json!({ "max_words": max_words, "provided": provided }),
            ),
            PipelineError::BaseGenerationTimeout { waited_secs } => JobError::with_meta(
                self.to_string(),
                json!({ "waited_secs": waited_secs }),
            ),
            other => JobError::new(other.to_string()),
        }
    }
}

impl From<leadrole_models::NarrationError> for PipelineError {
    fn from(err: leadrole_models::NarrationError) -> Self {
        match err {
            leadrole_models::NarrationError::TooLong {
                max_words,
                provided,
            } => PipelineError::NarrationTooLong {
                max_words,
                provided,
            },
        }
    }
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        if err.is_download() {
            PipelineError::AssetDownloadFailed(err.to_string())
        } else if err.is_bad_watermark() {
            PipelineError::WatermarkAssetInvalid(err.to_string())
        } else {
            PipelineError::CompositingFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_classification() {
        assert!(PipelineError::Store(StoreError::request_failed("down")).is_infrastructure());
        assert!(
            PipelineError::Queue(QueueError::enqueue_failed("down")).is_infrastructure()
        );
        assert!(!PipelineError::MissingPrompt.is_infrastructure());
        assert!(!PipelineError::FaceswapFailed {
            id: "pred-1".into(),
            reason: "failed".into()
        }
        .is_infrastructure());
        assert!(!PipelineError::Storage(StorageError::upload_failed("x")).is_infrastructure());
    }

    #[test]
    fn test_narration_error_carries_caps() {
        let err: PipelineError = leadrole_models::NarrationError::TooLong {
            max_words: 11,
            provided: 40,
        }
        .into();
        let job_error = err.job_error();
        let meta = job_error.meta.unwrap();
        assert_eq!(meta["max_words"], 11);
        assert_eq!(meta["provided"], 40);
    }

    #[test]
    fn test_media_error_mapping() {
        let err: PipelineError = MediaError::NotAnImage {
            content_type: "text/html".into(),
        }
        .into();
        assert!(matches!(err, PipelineError::WatermarkAssetInvalid(_)));

        let err: PipelineError = MediaError::download_failed("404").into();
        assert!(matches!(err, PipelineError::AssetDownloadFailed(_)));

        let err: PipelineError = MediaError::ffmpeg_failed("exit 1", None, Some(1)).into();
        assert!(matches!(err, PipelineError::CompositingFailed(_)));
    }
}
