//! Reconciliation sweep for stranded queued jobs.
//!
//! Job creation and enqueueing are not atomic: a crash between the two
//! leaves a record `queued` with no queue message behind it. The sweeper
//! periodically re-enqueues jobs whose `queued` status has outlived the
//! threshold. Re-enqueueing a job that *is* still in the queue only costs a
//! duplicate delivery, which the orchestrator's checkpointing absorbs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use leadrole_queue::WorkQueue;
use leadrole_store::{JobPatch, RecordStore};

use crate::error::PipelineResult;

/// Jobs examined per sweep cycle.
const SWEEP_BATCH: usize = 25;

/// Periodic re-enqueue of jobs stuck in `queued`.
pub struct QueuedJobSweeper {
    store: Arc<dyn RecordStore>,
    queue: Arc<dyn WorkQueue>,
    interval: Duration,
    stale_after: Duration,
}

impl QueuedJobSweeper {
    pub fn new(
        store: Arc<dyn RecordStore>,
        queue: Arc<dyn WorkQueue>,
        interval: Duration,
        stale_after: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            interval,
            stale_after,
        }
    }

    /// Run the sweep loop forever; spawn as a background task.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Starting queued-job sweeper");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(0) => {}
                Ok(n) => info!(count = n, "Re-enqueued stranded queued jobs"),
                Err(e) => error!(error = %e, "Sweep cycle failed"),
            }
        }
    }

    /// One sweep cycle; returns how many jobs were re-enqueued.
    pub async fn sweep_once(&self) -> PipelineResult<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.stale_after)
                .unwrap_or_else(|_| chrono::Duration::seconds(600));

        let stranded = self.store.find_queued_older_than(cutoff, SWEEP_BATCH).await?;
        let mut requeued = 0;

        for job in stranded {
            match self.queue.enqueue(&job.id).await {
                Ok(_) => {
                    // Bump updated_at so the next cycle doesn't grab it again
                    // while this delivery is still in flight.
                    self.store.merge_job(&job.id, JobPatch::new()).await.ok();
                    requeued += 1;
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Failed to re-enqueue stranded job");
                }
            }
        }

        Ok(requeued)
    }
}
