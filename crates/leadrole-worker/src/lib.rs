//! Pipeline orchestrator worker.
//!
//! Drives persona-to-video jobs through their ordered stages: validate,
//! base-video generation, durable mirroring, face swap, the optional
//! narration branch (speech synthesis + lip sync), watermarking, and final
//! upload. Also hosts the submission gate, the stranded-job sweeper, and
//! the queue executor.

pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod submit;
pub mod sweep;
pub mod vendors;

pub use config::WorkerConfig;
pub use error::{PipelineError, PipelineResult};
pub use executor::JobExecutor;
pub use pipeline::{FinalCandidate, Pipeline, PipelineContext};
pub use submit::{SubmissionGate, SubmitReceipt, SubmitRequest};
pub use sweep::QueuedJobSweeper;
