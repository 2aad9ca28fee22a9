//! Job executor: consume run messages and drive the pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use leadrole_queue::{JobQueue, RunJob};

use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::Pipeline;

/// Consumes the work queue and runs one pipeline per message.
///
/// Acking discipline: runs that reach a terminal job outcome (done, or
/// failed with a persisted reason) are acked — domain failures retry only
/// through explicit resubmission. Infrastructure failures are left
/// unacked, so the visibility timeout redelivers the run and it resumes
/// from its last checkpoint; a retry cap dead-letters runaway messages.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    pipeline: Pipeline,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: JobQueue, pipeline: Pipeline) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            pipeline,
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Start the executor.
    pub async fn run(&self) -> PipelineResult<()> {
        info!(
            consumer = %self.consumer_name,
            max_jobs = self.config.max_concurrent_jobs,
            "Starting job executor"
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Periodically claim messages idle past the threshold: crash recovery.
        let claim_task = {
            let queue = Arc::clone(&self.queue);
            let pipeline = self.pipeline.clone();
            let semaphore = Arc::clone(&self.job_semaphore);
            let consumer_name = self.consumer_name.clone();
            let claim_interval = self.config.claim_interval;
            let claim_min_idle = self.config.claim_min_idle;
            let mut shutdown_rx = self.shutdown.subscribe();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(claim_interval);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                break;
                            }
                        }
                        _ = interval.tick() => {
                            match queue
                                .claim_pending(&consumer_name, claim_min_idle.as_millis() as u64, 5)
                                .await
                            {
                                Ok(runs) if !runs.is_empty() => {
                                    info!("Claimed {} pending runs", runs.len());
                                    for (message_id, run) in runs {
                                        let Ok(permit) =
                                            Arc::clone(&semaphore).acquire_owned().await
                                        else {
                                            break;
                                        };
                                        let queue = Arc::clone(&queue);
                                        let pipeline = pipeline.clone();
                                        tokio::spawn(async move {
                                            let _permit = permit;
                                            Self::execute_run(pipeline, queue, message_id, run)
                                                .await;
                                        });
                                    }
                                }
                                Ok(_) => {}
                                Err(e) => warn!("Failed to claim pending runs: {}", e),
                            }
                        }
                    }
                }
            })
        };

        // Main consumption loop.
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume() => {
                    if let Err(e) = result {
                        error!("Error consuming runs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight runs to complete...");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs()).await;

        info!("Job executor stopped");
        Ok(())
    }

    async fn consume(&self) -> PipelineResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let runs = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if runs.is_empty() {
            return Ok(());
        }
        debug!("Consumed {} runs from queue", runs.len());

        for (message_id, run) in runs {
            let queue = Arc::clone(&self.queue);
            let pipeline = self.pipeline.clone();
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| {
                    PipelineError::Queue(leadrole_queue::QueueError::enqueue_failed(
                        "executor semaphore closed",
                    ))
                })?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_run(pipeline, queue, message_id, run).await;
            });
        }

        Ok(())
    }

    /// Execute one run and settle its queue message.
    async fn execute_run(
        pipeline: Pipeline,
        queue: Arc<JobQueue>,
        message_id: String,
        run: RunJob,
    ) {
        let job_id = run.job_id.clone();

        match pipeline.run(&job_id).await {
            Ok(()) => {
                if let Err(e) = queue.ack(&message_id).await {
                    error!(job_id = %job_id, "Failed to ack run: {}", e);
                }
            }
            Err(e) if !e.is_infrastructure() => {
                // Terminal domain failure: the job carries the reason, a
                // redelivery would just repeat it. Retry is an explicit
                // resubmission with a resume point.
                if let Err(ack_err) = queue.ack(&message_id).await {
                    error!(job_id = %job_id, "Failed to ack failed run: {}", ack_err);
                }
                warn!(job_id = %job_id, error = %e, "Run failed; awaiting explicit resume");
            }
            Err(e) => {
                let retry_count = queue.increment_retry(&message_id).await.unwrap_or(u32::MAX);
                let max_retries = queue.max_retries();

                if retry_count >= max_retries {
                    warn!(
                        job_id = %job_id,
                        retries = retry_count,
                        "Run exceeded max redeliveries, dead-lettering"
                    );
                    if let Err(dlq_err) = queue.dlq(&message_id, &run, &e.to_string()).await {
                        error!(job_id = %job_id, "Failed to dead-letter run: {}", dlq_err);
                    }
                } else {
                    info!(
                        job_id = %job_id,
                        attempt = retry_count,
                        max = max_retries,
                        "Infrastructure failure; run will redeliver"
                    );
                    // Not acked: redelivered after the visibility timeout.
                }
            }
        }
    }

    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
