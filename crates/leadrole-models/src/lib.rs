//! Shared data models for the LeadRole backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their assets, and vendor correlation refs
//! - Pipeline statuses and resume points
//! - Video output specs (aspect ratio, clip duration, resolution)
//! - Narration planning (duration fitting) and voice profile resolution
//! - Persona records

pub mod job;
pub mod narration;
pub mod persona;
pub mod status;
pub mod video;
pub mod voice;

// Re-export common types
pub use job::{
    Job, JobAssets, JobAudio, JobError, JobId, JobOptions, NarrationRequest, TransformRef,
    VendorRefs,
};
pub use narration::{plan_narration, NarrationError, NarrationPlan, PlanOptions};
pub use persona::Persona;
pub use status::{JobStatus, ResumePoint};
pub use video::{AspectRatio, ClipDuration, Resolution, VideoSpec};
pub use voice::{Gender, NarrationStyle, VoiceProfile};
