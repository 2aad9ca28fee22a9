//! Work queue for pipeline jobs, on Redis Streams.
//!
//! The queue carries job ids only; the record store is the source of truth.
//! Delivery is at-least-once: consumers ack after the pipeline reaches a
//! terminal outcome, and a claim pass redelivers messages from crashed
//! workers, so the orchestrator must be resume-safe.

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::RunJob;
pub use queue::{JobQueue, QueueConfig};

use async_trait::async_trait;

use leadrole_models::JobId;

/// The enqueue-side contract used by the submission gate and the sweeper.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueue a job id for exactly one worker invocation. Returns the
    /// transport message id.
    async fn enqueue(&self, job_id: &JobId) -> QueueResult<String>;
}
