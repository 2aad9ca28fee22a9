//! Pipeline status values and resume points.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a job as it moves through the pipeline.
///
/// Statuses advance forward through the stage order or jump to `Failed`;
/// they never revert. `Done` and `Failed` are the only terminal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created by the submission gate, waiting for a worker
    #[default]
    Queued,
    /// Checking the job record and prompt before any stage runs
    Validating,
    /// Base video generation in flight at the vendor
    GeneratingBase,
    /// Mirroring the base video into durable storage
    UploadingBase,
    /// Face transform in flight at the vendor
    Faceswap,
    /// Speech synthesis in flight
    TtsGenerating,
    /// Speech synthesis finished, audio persisted
    TtsDone,
    /// Lip-sync transform in flight at the vendor
    Lipsync,
    /// Compositing the watermark onto the final candidate
    Watermarking,
    /// Final asset uploaded, job complete
    Done,
    /// Terminal failure; `Job::error` carries the reason
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Validating => "validating",
            JobStatus::GeneratingBase => "generating_base",
            JobStatus::UploadingBase => "uploading_base",
            JobStatus::Faceswap => "faceswap",
            JobStatus::TtsGenerating => "tts_generating",
            JobStatus::TtsDone => "tts_done",
            JobStatus::Lipsync => "lipsync",
            JobStatus::Watermarking => "watermarking",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// Position in the forward stage order. `Failed` shares the top slot
    /// with `Done` so that terminal states compare ahead of everything else.
    pub fn phase(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Validating => 1,
            JobStatus::GeneratingBase => 2,
            JobStatus::UploadingBase => 3,
            JobStatus::Faceswap => 4,
            JobStatus::TtsGenerating => 5,
            JobStatus::TtsDone => 6,
            JobStatus::Lipsync => 7,
            JobStatus::Watermarking => 8,
            JobStatus::Done => 9,
            JobStatus::Failed => 9,
        }
    }

    /// Check if this is a terminal state (no more transitions expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Whether a transition to `next` is legal: strictly forward through the
    /// stage order, or a jump to `Failed` from any non-terminal state.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobStatus::Failed {
            return true;
        }
        next.phase() > self.phase()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory resume point supplied on resubmission.
///
/// The orchestrator trusts the named point but also treats "asset already
/// present" as an independent skip condition, so an under-specified resume
/// still avoids redundant vendor calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResumePoint {
    /// Run whatever is missing, in order
    #[default]
    Auto,
    /// Base video exists (or its generation can be re-polled); redo everything after it
    PostBase,
    /// Redo from the face transform onward
    Faceswap,
    /// Redo from the lip-sync transform onward
    Lipsync,
}

impl ResumePoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumePoint::Auto => "auto",
            ResumePoint::PostBase => "post_base",
            ResumePoint::Faceswap => "faceswap",
            ResumePoint::Lipsync => "lipsync",
        }
    }

    /// True for any explicit resume request.
    pub fn is_resume(&self) -> bool {
        !matches!(self, ResumePoint::Auto)
    }

    /// Whether this resume point forces the face transform to run again
    /// even when a previous result exists.
    pub fn forces_faceswap(&self) -> bool {
        matches!(self, ResumePoint::PostBase | ResumePoint::Faceswap)
    }

    /// Whether this resume point forces speech synthesis to run again.
    pub fn forces_tts(&self) -> bool {
        matches!(self, ResumePoint::PostBase | ResumePoint::Faceswap)
    }

    /// Whether this resume point forces the lip-sync transform to run again.
    pub fn forces_lipsync(&self) -> bool {
        matches!(
            self,
            ResumePoint::PostBase | ResumePoint::Faceswap | ResumePoint::Lipsync
        )
    }
}

impl fmt::Display for ResumePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_advances_forward_only() {
        assert!(JobStatus::Queued.can_advance_to(JobStatus::Validating));
        assert!(JobStatus::Validating.can_advance_to(JobStatus::Watermarking));
        assert!(!JobStatus::Faceswap.can_advance_to(JobStatus::GeneratingBase));
        assert!(!JobStatus::Watermarking.can_advance_to(JobStatus::Watermarking));
    }

    #[test]
    fn test_failed_reachable_from_any_non_terminal() {
        assert!(JobStatus::Queued.can_advance_to(JobStatus::Failed));
        assert!(JobStatus::Lipsync.can_advance_to(JobStatus::Failed));
        assert!(!JobStatus::Done.can_advance_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_advance_to(JobStatus::Failed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::TtsDone.is_terminal());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&JobStatus::GeneratingBase).unwrap();
        assert_eq!(json, "\"generating_base\"");
        let back: JobStatus = serde_json::from_str("\"tts_done\"").unwrap();
        assert_eq!(back, JobStatus::TtsDone);
    }

    #[test]
    fn test_resume_point_forcing() {
        assert!(ResumePoint::PostBase.forces_faceswap());
        assert!(ResumePoint::Faceswap.forces_lipsync());
        assert!(!ResumePoint::Lipsync.forces_faceswap());
        assert!(ResumePoint::Lipsync.forces_lipsync());
        assert!(!ResumePoint::Auto.forces_faceswap());
        assert!(!ResumePoint::Auto.is_resume());
    }
}
