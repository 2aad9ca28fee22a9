//! Pipeline worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use leadrole_providers::{DreamClient, SpeechClient, TransformClient};
use leadrole_queue::JobQueue;
use leadrole_storage::R2Client;
use leadrole_store::FirestoreRecordStore;
use leadrole_worker::vendors::{
    BaseVideoAdapter, FaceSwapAdapter, LipSyncAdapter, MediaCompositor, SpeechAdapter, VoiceMap,
};
use leadrole_worker::{
    JobExecutor, Pipeline, PipelineContext, QueuedJobSweeper, WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::from_default_env().add_directive("leadrole=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting leadrole-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let store = match FirestoreRecordStore::from_env() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create record store: {}", e);
            std::process::exit(1);
        }
    };

    let objects = match R2Client::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to create object store client: {}", e);
            std::process::exit(1);
        }
    };

    let dream = match DreamClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create base-video client: {}", e);
            std::process::exit(1);
        }
    };
    let transform = match TransformClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create transform client: {}", e);
            std::process::exit(1);
        }
    };
    let speech = match SpeechClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create speech client: {}", e);
            std::process::exit(1);
        }
    };

    let ctx = Arc::new(PipelineContext {
        store: store.clone(),
        objects,
        base_video: Arc::new(BaseVideoAdapter::new(dream)),
        faceswap: Arc::new(FaceSwapAdapter::new(
            transform.clone(),
            config.faceswap_version.clone(),
        )),
        lipsync: Arc::new(LipSyncAdapter::new(
            transform,
            config.lipsync_model.clone(),
        )),
        speech: Arc::new(SpeechAdapter::new(speech, VoiceMap::from_env())),
        compositor: Arc::new(MediaCompositor::new(config.overlay)),
        config: config.clone(),
    });
    let pipeline = Pipeline::new(ctx);

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    // Sweeper closes the create-without-enqueue gap.
    let sweeper_queue = match JobQueue::from_env() {
        Ok(q) => Arc::new(q),
        Err(e) => {
            error!("Failed to create sweeper queue client: {}", e);
            std::process::exit(1);
        }
    };
    let sweeper = QueuedJobSweeper::new(
        store,
        sweeper_queue,
        config.sweep_interval,
        config.queued_stale_after,
    );
    tokio::spawn(async move { sweeper.run().await });

    let executor = Arc::new(JobExecutor::new(config, queue, pipeline));

    // Shut down cleanly on ctrl-c.
    {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            executor.shutdown();
        });
    }

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
